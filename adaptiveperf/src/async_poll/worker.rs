//! Dedicated single-thread executor for slow telemetry reads.
//!
//! Vendor telemetry calls can take several milliseconds and may require
//! per-thread environment setup (attaching the thread to a VM, for
//! example). A [`TelemetryWorker`] owns exactly one named OS thread that
//! runs those calls one at a time, in submission order, from a blocking
//! queue. Jobs are never executed inline on the submitting thread.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──► on_attach ──► [job, job, ...] ──► queue closed ──► on_detach ──► exit
//! ```
//!
//! [`shutdown`](TelemetryWorker::shutdown) closes the queue, lets the jobs
//! already queued run to completion and joins the thread. Dropping the
//! worker does the same.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::WorkerError;

/// A unit of work executed on the worker thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Optional per-thread setup and teardown run on the worker thread itself.
#[derive(Default)]
pub struct WorkerHooks {
    on_attach: Option<Hook>,
    on_detach: Option<Hook>,
}

impl WorkerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once on the worker thread before the first job.
    pub fn on_attach(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_attach = Some(Box::new(hook));
        self
    }

    /// Runs once on the worker thread after the queue has been drained.
    pub fn on_detach(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_detach = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for WorkerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHooks")
            .field("on_attach", &self.on_attach.is_some())
            .field("on_detach", &self.on_detach.is_some())
            .finish()
    }
}

/// Single named thread processing a FIFO queue of telemetry jobs.
///
/// Shared between the async values of one telemetry domain through
/// `Arc<TelemetryWorker>`.
pub struct TelemetryWorker {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelemetryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryWorker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl TelemetryWorker {
    /// Spawns a worker thread with the given name and no hooks.
    pub fn spawn(name: impl Into<String>) -> Result<Self, WorkerError> {
        Self::spawn_with_hooks(name, WorkerHooks::default())
    }

    /// Spawns a worker thread running `hooks` around its job loop.
    pub fn spawn_with_hooks(
        name: impl Into<String>,
        hooks: WorkerHooks,
    ) -> Result<Self, WorkerError> {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_jobs(thread_name, receiver, hooks))
            .map_err(|source| WorkerError::Spawn {
                name: name.clone(),
                source,
            })?;

        tracing::debug!(worker = %name, "Telemetry worker started");

        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Number of jobs waiting in the queue (not counting the running one).
    pub fn queued(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, |s| s.len())
    }

    /// Queues a job. Returns `false` if the worker has been shut down.
    pub fn submit(&self, job: Job) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    /// Stops accepting work, drains the queue and joins the thread.
    ///
    /// Idempotent. When called from a job running on the worker itself the
    /// queue is closed but the join is skipped.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if thread::current().id() == self.thread_id {
            tracing::warn!(worker = %self.name, "Shutdown requested from the worker thread");
            return;
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(worker = %self.name, "Telemetry worker exited abnormally");
            }
        }
        tracing::debug!(worker = %self.name, "Telemetry worker stopped");
    }
}

impl Drop for TelemetryWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_jobs(name: String, receiver: Receiver<Job>, hooks: WorkerHooks) {
    if let Some(attach) = hooks.on_attach {
        attach();
    }

    // Ends once every sender is gone and the queue is empty.
    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!(worker = %name, "Telemetry read panicked; result dropped");
        }
    }

    if let Some(detach) = hooks.on_detach {
        detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let worker = TelemetryWorker::spawn("fifo-test").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            assert!(worker.submit(Box::new(move || seen.lock().push(i))));
        }

        worker.shutdown();
        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_never_run_on_caller_thread() {
        let worker = TelemetryWorker::spawn("thread-test").unwrap();
        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        worker.submit(Box::new(move || {
            let current = thread::current();
            *slot.lock() = Some((current.id(), current.name().map(String::from)));
        }));
        worker.shutdown();

        let (id, name) = ran_on.lock().clone().unwrap();
        assert_ne!(id, caller);
        assert_eq!(name.as_deref(), Some("thread-test"));
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let worker = TelemetryWorker::spawn("closed-test").unwrap();
        worker.shutdown();

        assert!(!worker.is_running());
        assert!(!worker.submit(Box::new(|| {})));
        // Second shutdown is a no-op.
        worker.shutdown();
    }

    #[test]
    fn test_hooks_wrap_job_loop() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let attach = Arc::clone(&order);
        let detach = Arc::clone(&order);
        let hooks = WorkerHooks::new()
            .on_attach(move || attach.lock().push("attach"))
            .on_detach(move || detach.lock().push("detach"));

        let worker = TelemetryWorker::spawn_with_hooks("hook-test", hooks).unwrap();
        let job = Arc::clone(&order);
        worker.submit(Box::new(move || job.lock().push("job")));
        drop(worker);

        assert_eq!(*order.lock(), vec!["attach", "job", "detach"]);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let worker = TelemetryWorker::spawn("panic-test").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        worker.submit(Box::new(|| panic!("native call failed")));
        let c = Arc::clone(&counter);
        worker.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        worker.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let worker = TelemetryWorker::spawn("drain-test").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let c = Arc::clone(&counter);
            worker.submit(Box::new(move || {
                thread::sleep(std::time::Duration::from_micros(50));
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        worker.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(worker.queued(), 0);
    }
}
