//! Hand-driven telemetry source.
//!
//! The source and its [`ScriptedSourceHandle`] share one state block, so a
//! test or simulator keeps full control after the source has been moved into
//! a controller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use semver::Version;

use crate::source::{EventSink, TelemetrySource, TelemetrySourceFactory};
use crate::types::{
    WarningLevel, MIN_CPU_PERFORMANCE_LEVEL, MIN_GPU_PERFORMANCE_LEVEL, UNAVAILABLE,
};

/// Default maximum CPU level of a scripted source.
pub const SCRIPTED_MAX_CPU_LEVEL: i32 = 4;

/// Default maximum GPU level of a scripted source.
pub const SCRIPTED_MAX_GPU_LEVEL: i32 = 2;

#[derive(Debug)]
struct ScriptState {
    max_cpu_level: i32,
    max_gpu_level: i32,
    gpu_frame_time: f32,
    accepts_performance_level: bool,
    start_succeeds: bool,
    sink: Option<EventSink>,
    started: bool,
    destroyed: bool,
    last_applied: Option<(i32, i32)>,
    set_level_calls: usize,
    update_calls: usize,
    pause_calls: usize,
    resume_calls: usize,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            max_cpu_level: SCRIPTED_MAX_CPU_LEVEL,
            max_gpu_level: SCRIPTED_MAX_GPU_LEVEL,
            gpu_frame_time: UNAVAILABLE,
            accepts_performance_level: true,
            start_succeeds: true,
            sink: None,
            started: false,
            destroyed: false,
            last_applied: None,
            set_level_calls: 0,
            update_calls: 0,
            pause_calls: 0,
            resume_calls: 0,
        }
    }
}

/// Telemetry source whose readings and events are set by hand.
///
/// Accepts a level pair iff `accepts_performance_level` is set and both
/// levels lie in `[0, max]`.
#[derive(Debug)]
pub struct ScriptedTelemetrySource {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTelemetrySource {
    /// Creates a source with max CPU level 4 and max GPU level 2.
    pub fn new() -> Self {
        Self::with_max_levels(SCRIPTED_MAX_CPU_LEVEL, SCRIPTED_MAX_GPU_LEVEL)
    }

    pub fn with_max_levels(max_cpu_level: i32, max_gpu_level: i32) -> Self {
        let state = ScriptState {
            max_cpu_level,
            max_gpu_level,
            ..ScriptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn handle(&self) -> ScriptedSourceHandle {
        ScriptedSourceHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for ScriptedTelemetrySource {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for ScriptedTelemetrySource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self, events: EventSink, _now: Duration) -> bool {
        let mut state = self.state.lock();
        if !state.start_succeeds {
            return false;
        }
        state.sink = Some(events);
        state.started = true;
        true
    }

    fn stop(&mut self) {
        self.state.lock().started = false;
    }

    fn destroy(&mut self) {
        let mut state = self.state.lock();
        state.started = false;
        state.destroyed = true;
        state.sink = None;
    }

    fn update(&mut self, _now: Duration) {
        self.state.lock().update_calls += 1;
    }

    fn gpu_frame_time(&self) -> f32 {
        self.state.lock().gpu_frame_time
    }

    fn set_performance_level(&mut self, cpu_level: i32, gpu_level: i32) -> bool {
        let mut state = self.state.lock();
        state.set_level_calls += 1;

        let accepted = state.accepts_performance_level
            && (MIN_CPU_PERFORMANCE_LEVEL..=state.max_cpu_level).contains(&cpu_level)
            && (MIN_GPU_PERFORMANCE_LEVEL..=state.max_gpu_level).contains(&gpu_level);

        if accepted {
            state.last_applied = Some((cpu_level, gpu_level));
        }
        accepted
    }

    fn max_cpu_performance_level(&self) -> i32 {
        self.state.lock().max_cpu_level
    }

    fn max_gpu_performance_level(&self) -> i32 {
        self.state.lock().max_gpu_level
    }

    fn application_pause(&mut self) {
        self.state.lock().pause_calls += 1;
    }

    fn application_resume(&mut self, _now: Duration) {
        self.state.lock().resume_calls += 1;
    }

    fn version(&self) -> Option<Version> {
        Some(Version::new(1, 0, 0))
    }

    fn stats(&self) -> String {
        let state = self.state.lock();
        format!(
            "gpu_frame_time={:.4} set_level_calls={}",
            state.gpu_frame_time, state.set_level_calls
        )
    }
}

/// Remote control for a [`ScriptedTelemetrySource`].
#[derive(Debug, Clone)]
pub struct ScriptedSourceHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSourceHandle {
    /// Reports a warning level change. Returns `false` if the source is not started.
    pub fn emit_warning(&self, level: WarningLevel) -> bool {
        self.with_sink(|sink| sink.warning_level_changed(level))
    }

    /// Reports a temperature change. Returns `false` if the source is not started.
    pub fn emit_temperature(&self, level: f32, trend: f32) -> bool {
        self.with_sink(|sink| sink.temperature_changed(level, trend))
    }

    /// Reports that the device dropped the applied level.
    pub fn emit_level_disabled(&self) -> bool {
        self.with_sink(EventSink::performance_level_disabled)
    }

    pub fn set_gpu_frame_time(&self, seconds: f32) {
        self.state.lock().gpu_frame_time = seconds;
    }

    pub fn set_accepts_performance_level(&self, accepts: bool) {
        self.state.lock().accepts_performance_level = accepts;
    }

    /// Makes the next `start` fail (or succeed again).
    pub fn set_start_succeeds(&self, succeeds: bool) {
        self.state.lock().start_succeeds = succeeds;
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// The last level pair the source accepted.
    pub fn last_applied(&self) -> Option<(i32, i32)> {
        self.state.lock().last_applied
    }

    pub fn set_level_calls(&self) -> usize {
        self.state.lock().set_level_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().update_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.state.lock().resume_calls
    }

    /// A factory creating sources that share this handle's state.
    pub fn factory(&self) -> ScriptedSourceFactory {
        ScriptedSourceFactory {
            state: Arc::clone(&self.state),
        }
    }

    fn with_sink(&self, f: impl FnOnce(&EventSink)) -> bool {
        // Clone out so the callback runs without the script lock held.
        let sink = self.state.lock().sink.clone();
        match sink {
            Some(sink) => {
                f(&sink);
                true
            }
            None => false,
        }
    }
}

/// Factory returned by [`ScriptedSourceHandle::factory`].
#[derive(Debug, Clone)]
pub struct ScriptedSourceFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl TelemetrySourceFactory for ScriptedSourceFactory {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(&self) -> Box<dyn TelemetrySource> {
        {
            let mut state = self.state.lock();
            state.destroyed = false;
        }
        Box::new(ScriptedTelemetrySource {
            state: Arc::clone(&self.state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_PERFORMANCE_LEVEL;

    #[test]
    fn test_defaults() {
        let source = ScriptedTelemetrySource::new();
        assert_eq!(source.max_cpu_performance_level(), 4);
        assert_eq!(source.max_gpu_performance_level(), 2);
        assert_eq!(source.gpu_frame_time(), UNAVAILABLE);
        assert_eq!(source.version(), Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_level_validation() {
        let mut source = ScriptedTelemetrySource::new();
        let handle = source.handle();

        assert!(source.set_performance_level(0, 0));
        assert!(source.set_performance_level(4, 2));
        assert!(!source.set_performance_level(5, 2));
        assert!(!source.set_performance_level(4, 3));
        assert!(!source.set_performance_level(1, -2));
        assert!(!source.set_performance_level(UNKNOWN_PERFORMANCE_LEVEL, 0));

        assert_eq!(handle.last_applied(), Some((4, 2)));
        assert_eq!(handle.set_level_calls(), 6);
    }

    #[test]
    fn test_rejects_when_not_accepting() {
        let mut source = ScriptedTelemetrySource::new();
        source.handle().set_accepts_performance_level(false);
        assert!(!source.set_performance_level(1, 1));
    }

    #[test]
    fn test_events_require_started_source() {
        let mut source = ScriptedTelemetrySource::new();
        let handle = source.handle();
        assert!(!handle.emit_warning(WarningLevel::Throttling));

        let sink = EventSink::new();
        assert!(source.start(sink.clone(), Duration::ZERO));
        assert!(handle.is_started());
        assert!(handle.emit_warning(WarningLevel::Throttling));
        assert_eq!(sink.warning_level(), WarningLevel::Throttling);

        source.destroy();
        assert!(handle.is_destroyed());
        assert!(!handle.emit_level_disabled());
    }

    #[test]
    fn test_failed_start() {
        let mut source = ScriptedTelemetrySource::new();
        let handle = source.handle();
        handle.set_start_succeeds(false);

        assert!(!source.start(EventSink::new(), Duration::ZERO));
        assert!(!handle.is_started());
        assert!(!handle.emit_temperature(0.5, 0.0));
    }

    #[test]
    fn test_factory_shares_state() {
        let handle = ScriptedTelemetrySource::new().handle();
        let factory = handle.factory();
        let mut source = factory.create();

        handle.set_gpu_frame_time(0.012);
        assert_eq!(source.gpu_frame_time(), 0.012);

        source.update(Duration::ZERO);
        source.application_pause();
        source.application_resume(Duration::ZERO);
        assert_eq!(handle.update_calls(), 1);
        assert_eq!(handle.pause_calls(), 1);
        assert_eq!(handle.resume_calls(), 1);
    }
}
