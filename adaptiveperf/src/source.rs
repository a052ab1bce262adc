//! Telemetry source abstraction.
//!
//! A [`TelemetrySource`] is the device-specific backend the controller polls
//! once per tick. Sources report asynchronous happenings (thermal warnings,
//! temperature changes, the device dropping an applied level) through an
//! [`EventSink`], which may be called from any thread.
//!
//! # Event flow
//!
//! ```text
//!  vendor callback thread        tick thread
//!  ──────────────────────        ───────────
//!  EventSink::send(event)
//!    └─► lock ─► SharedTelemetry ◄─ lock ◄─ PerformanceController::tick
//!        { warning, active cpu/gpu, pending temperature }
//! ```
//!
//! A `Throttling` warning resets the active levels inside the callback so
//! the next tick never trusts a level the device has already dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use semver::Version;

use crate::types::{
    clamp_temperature_level, clamp_temperature_trend, WarningLevel, UNKNOWN_PERFORMANCE_LEVEL,
};

/// Asynchronous notification raised by a telemetry source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryEvent {
    /// The device changed its thermal warning level.
    WarningLevelChanged(WarningLevel),
    /// Normalized temperature level in `[0, 1]` (or -1) and trend in `[-1, 1]`.
    TemperatureChanged { level: f32, trend: f32 },
    /// The device reset a previously applied performance level on its own.
    PerformanceLevelDisabled,
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WarningLevelChanged(level) => write!(f, "warning level {}", level),
            Self::TemperatureChanged { level, trend } => {
                write!(f, "temperature {:.2} (trend {:.2})", level, trend)
            }
            Self::PerformanceLevelDisabled => write!(f, "performance level disabled"),
        }
    }
}

/// State shared between telemetry callbacks and the tick thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SharedTelemetry {
    pub warning_level: WarningLevel,
    pub active_cpu_level: i32,
    pub active_gpu_level: i32,
    /// Latest temperature reading not yet adopted by a tick.
    pub pending_temperature: Option<(f32, f32)>,
}

impl Default for SharedTelemetry {
    fn default() -> Self {
        Self {
            warning_level: WarningLevel::NoWarning,
            active_cpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            active_gpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            pending_temperature: None,
        }
    }
}

impl SharedTelemetry {
    fn reset_active_levels(&mut self) {
        self.active_cpu_level = UNKNOWN_PERFORMANCE_LEVEL;
        self.active_gpu_level = UNKNOWN_PERFORMANCE_LEVEL;
    }
}

/// Thread-safe mailbox through which a source reports events.
///
/// Cloning is cheap; every clone feeds the same controller.
#[derive(Clone, Default)]
pub struct EventSink {
    shared: Arc<Mutex<SharedTelemetry>>,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.shared.lock();
        f.debug_struct("EventSink")
            .field("warning_level", &state.warning_level)
            .field("active_cpu_level", &state.active_cpu_level)
            .field("active_gpu_level", &state.active_gpu_level)
            .field("pending_temperature", &state.pending_temperature)
            .finish()
    }
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event. Safe to call from any thread.
    pub fn send(&self, event: TelemetryEvent) {
        tracing::debug!(%event, "Telemetry event");

        let mut state = self.shared.lock();
        match event {
            TelemetryEvent::WarningLevelChanged(level) => {
                state.warning_level = level;
                if level == WarningLevel::Throttling {
                    state.reset_active_levels();
                }
            }
            TelemetryEvent::TemperatureChanged { level, trend } => {
                state.pending_temperature =
                    Some((clamp_temperature_level(level), clamp_temperature_trend(trend)));
            }
            TelemetryEvent::PerformanceLevelDisabled => {
                state.reset_active_levels();
            }
        }
    }

    pub fn warning_level_changed(&self, level: WarningLevel) {
        self.send(TelemetryEvent::WarningLevelChanged(level));
    }

    pub fn temperature_changed(&self, level: f32, trend: f32) {
        self.send(TelemetryEvent::TemperatureChanged { level, trend });
    }

    pub fn performance_level_disabled(&self) {
        self.send(TelemetryEvent::PerformanceLevelDisabled);
    }

    /// The warning level most recently reported.
    pub fn warning_level(&self) -> WarningLevel {
        self.shared.lock().warning_level
    }

    /// Runs `f` with the shared state locked.
    ///
    /// Keep `f` short and never call into a source from inside it.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SharedTelemetry) -> R) -> R {
        f(&mut self.shared.lock())
    }
}

/// A device-specific telemetry backend polled by the controller.
///
/// Implementations must not panic across this boundary: native failures
/// are logged and reported as the `-1` sentinel.
pub trait TelemetrySource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Initializes the backend.
    ///
    /// # Arguments
    ///
    /// * `events` - Mailbox for asynchronous notifications
    /// * `now` - Session time, used to timestamp initial readings
    ///
    /// # Returns
    ///
    /// `true` if the backend is initialized and usable.
    fn start(&mut self, events: EventSink, now: Duration) -> bool;

    fn stop(&mut self);

    /// Releases the backend. Called exactly once, also for sources that
    /// failed to start.
    fn destroy(&mut self);

    /// Per-tick housekeeping: poll background readings, emit temperature
    /// events.
    fn update(&mut self, _now: Duration) {}

    /// Last GPU frame time in seconds, or -1 if unavailable.
    fn gpu_frame_time(&self) -> f32;

    /// Asks the device to apply a level pair. Returns `true` iff accepted.
    fn set_performance_level(&mut self, cpu_level: i32, gpu_level: i32) -> bool;

    fn max_cpu_performance_level(&self) -> i32;

    fn max_gpu_performance_level(&self) -> i32;

    fn application_pause(&mut self) {}

    fn application_resume(&mut self, _now: Duration) {}

    fn version(&self) -> Option<Version>;

    /// One-line diagnostic summary for periodic stats logging.
    fn stats(&self) -> String {
        String::new()
    }
}

/// Creates candidate sources for controller startup.
pub trait TelemetrySourceFactory {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn TelemetrySource>;
}

/// Factory backed by a closure.
pub struct FnSourceFactory<F> {
    name: String,
    create: F,
}

impl<F> FnSourceFactory<F>
where
    F: Fn() -> Box<dyn TelemetrySource>,
{
    pub fn new(name: impl Into<String>, create: F) -> Self {
        Self {
            name: name.into(),
            create,
        }
    }
}

impl<F> fmt::Debug for FnSourceFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSourceFactory")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> TelemetrySourceFactory for FnSourceFactory<F>
where
    F: Fn() -> Box<dyn TelemetrySource>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> Box<dyn TelemetrySource> {
        (self.create)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_resets_active_levels() {
        let sink = EventSink::new();
        sink.with_state(|s| {
            s.active_cpu_level = 2;
            s.active_gpu_level = 1;
        });

        sink.warning_level_changed(WarningLevel::ThrottlingImminent);
        assert_eq!(sink.with_state(|s| s.active_cpu_level), 2);

        sink.warning_level_changed(WarningLevel::Throttling);
        let state = sink.with_state(|s| *s);
        assert_eq!(state.warning_level, WarningLevel::Throttling);
        assert_eq!(state.active_cpu_level, UNKNOWN_PERFORMANCE_LEVEL);
        assert_eq!(state.active_gpu_level, UNKNOWN_PERFORMANCE_LEVEL);
    }

    #[test]
    fn test_level_disabled_resets_active_levels() {
        let sink = EventSink::new();
        sink.with_state(|s| {
            s.active_cpu_level = 3;
            s.active_gpu_level = 3;
        });

        sink.performance_level_disabled();
        let state = sink.with_state(|s| *s);
        assert_eq!(state.active_cpu_level, UNKNOWN_PERFORMANCE_LEVEL);
        assert_eq!(state.warning_level, WarningLevel::NoWarning);
    }

    #[test]
    fn test_temperature_is_clamped_and_latest_wins() {
        let sink = EventSink::new();
        sink.temperature_changed(0.3, 0.5);
        sink.temperature_changed(1.7, -4.0);

        let pending = sink.with_state(|s| s.pending_temperature);
        assert_eq!(pending, Some((1.0, -1.0)));
    }

    #[test]
    fn test_clones_share_state() {
        let sink = EventSink::new();
        let clone = sink.clone();

        std::thread::spawn(move || clone.warning_level_changed(WarningLevel::Throttling))
            .join()
            .unwrap();

        assert_eq!(sink.warning_level(), WarningLevel::Throttling);
    }

    #[test]
    fn test_event_display() {
        let event = TelemetryEvent::TemperatureChanged {
            level: 0.5,
            trend: -0.5,
        };
        assert_eq!(event.to_string(), "temperature 0.50 (trend -0.50)");
    }
}
