//! Cached telemetry value refreshed in the background.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use super::worker::TelemetryWorker;

/// Read function executed on the worker thread.
pub type ReadFn<T> = Arc<dyn Fn() -> T + Send + Sync + 'static>;

/// A telemetry reading cached on the consumer side and refreshed on a
/// [`TelemetryWorker`].
///
/// The worker never touches the cached value: each dispatched read hands its
/// result back through a one-shot channel, and the result is adopted by the
/// next [`poll`](Self::poll) on the consumer thread. `&mut self` on every
/// mutating method keeps the cached value single-writer.
///
/// Timestamps are monotonic offsets supplied by the caller (typically time
/// since the session started).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use adaptiveperf::async_poll::{AsyncValue, TelemetryWorker};
///
/// let worker = Arc::new(TelemetryWorker::spawn("doc-worker").unwrap());
/// let mut level = AsyncValue::new(worker, -1, Duration::from_secs(3), || 4);
///
/// // Startup wants an accurate reading right away.
/// level.sync_poll(Duration::ZERO);
/// assert_eq!(*level.value(), 4);
/// ```
pub struct AsyncValue<T> {
    worker: Arc<TelemetryWorker>,
    read: ReadFn<T>,
    value: T,
    change_timestamp: Duration,
    last_completed_at: Duration,
    min_refresh_interval: Duration,
    pending: Option<Receiver<T>>,
    reads_dispatched: u64,
}

impl<T: std::fmt::Debug> std::fmt::Debug for AsyncValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncValue")
            .field("worker", &self.worker.name())
            .field("value", &self.value)
            .field("change_timestamp", &self.change_timestamp)
            .field("last_completed_at", &self.last_completed_at)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("in_flight", &self.pending.is_some())
            .finish()
    }
}

impl<T> AsyncValue<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Creates a value with `initial` cached and no read in flight.
    pub fn new(
        worker: Arc<TelemetryWorker>,
        initial: T,
        min_refresh_interval: Duration,
        read: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            worker,
            read: Arc::new(read),
            value: initial,
            change_timestamp: Duration::ZERO,
            last_completed_at: Duration::ZERO,
            min_refresh_interval,
            pending: None,
            reads_dispatched: 0,
        }
    }

    /// Adopts a completed background read and schedules the next one.
    ///
    /// Never blocks. Returns `true` iff a read completed with a value
    /// different from the cached one.
    pub fn poll(&mut self, now: Duration) -> bool {
        let mut changed = false;

        if let Some(receiver) = &self.pending {
            match receiver.try_recv() {
                Ok(new_value) => {
                    self.pending = None;
                    changed = self.adopt(new_value, now);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    // The job was dropped without producing a result.
                    tracing::debug!(
                        worker = %self.worker.name(),
                        "Telemetry read abandoned; keeping cached value"
                    );
                    self.pending = None;
                    self.last_completed_at = now;
                }
            }
        }

        if self.pending.is_none() && self.refresh_due(now) {
            self.dispatch();
        }

        changed
    }

    /// Reads synchronously on the calling thread.
    ///
    /// Any read in flight is discarded. Used at startup and on resume where
    /// a stale cached value is not acceptable. Returns `true` if the value
    /// changed.
    pub fn sync_poll(&mut self, now: Duration) -> bool {
        self.pending = None;
        let new_value = (self.read)();
        self.adopt(new_value, now)
    }

    /// The last adopted value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the cached value last changed.
    pub fn change_timestamp(&self) -> Duration {
        self.change_timestamp
    }

    /// When the last read was adopted.
    pub fn last_completed_at(&self) -> Duration {
        self.last_completed_at
    }

    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Total number of background reads handed to the worker.
    pub fn reads_dispatched(&self) -> u64 {
        self.reads_dispatched
    }

    fn adopt(&mut self, new_value: T, now: Duration) -> bool {
        let changed = new_value != self.value;
        if changed {
            self.change_timestamp = now;
        }
        self.value = new_value;
        self.last_completed_at = now;
        changed
    }

    fn refresh_due(&self, now: Duration) -> bool {
        now.checked_sub(self.last_completed_at)
            .is_some_and(|elapsed| elapsed > self.min_refresh_interval)
    }

    fn dispatch(&mut self) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let read = Arc::clone(&self.read);

        let accepted = self.worker.submit(Box::new(move || {
            // The consumer may have discarded this read already.
            let _ = sender.send(read());
        }));

        if accepted {
            self.pending = Some(receiver);
            self.reads_dispatched += 1;
        } else {
            tracing::trace!(
                worker = %self.worker.name(),
                "Telemetry worker stopped; read not dispatched"
            );
        }
    }
}
