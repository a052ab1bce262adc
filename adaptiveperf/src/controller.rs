//! Per-frame performance controller.
//!
//! The host owns one [`PerformanceController`] and calls
//! [`tick`](PerformanceController::tick) once per rendered frame.
//!
//! # Tick pipeline
//!
//! ```text
//! source.update(now)
//!   │
//!   ▼
//! frame times ──► RunningAverage (overall, GPU) ──full?──► classify ──► bottleneck event
//!   │
//!   ▼
//! lock: {warning, active cpu/gpu, pending temperature}
//!   │
//!   ├─ warning or temperature changed ──► thermal event
//!   │
//!   ├─ not throttling, requested != active ──► set_performance_level
//!   │        ├─ accepted ──► current = requested
//!   │        └─ rejected ──► active = current = unknown
//!   │
//!   └─ throttling ──► current = unknown
//! ```
//!
//! No lock is held while the telemetry source is called.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::bottleneck::classify;
use crate::config::ControllerConfig;
use crate::running_average::RunningAverage;
use crate::source::{EventSink, TelemetrySource, TelemetrySourceFactory};
use crate::types::{
    Bottleneck, BottleneckChangeEvent, ThermalEvent, WarningLevel, UNAVAILABLE,
    UNKNOWN_PERFORMANCE_LEVEL,
};

/// Capacity of each notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notifications produced by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub thermal: Option<ThermalEvent>,
    pub bottleneck: Option<BottleneckChangeEvent>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.thermal.is_none() && self.bottleneck.is_none()
    }
}

/// Aggregates frame timing and thermal telemetry and applies performance
/// levels through the selected [`TelemetrySource`].
///
/// Without a source the controller is inert: ticks do nothing and every
/// property reports its sentinel.
pub struct PerformanceController {
    config: ControllerConfig,
    source: Option<Box<dyn TelemetrySource>>,
    events: EventSink,

    overall_frame_time: RunningAverage,
    gpu_frame_time: RunningAverage,
    bottleneck: Bottleneck,

    warning_level: WarningLevel,
    temperature_level: f32,
    temperature_trend: f32,

    requested_cpu_level: i32,
    requested_gpu_level: i32,
    current_cpu_level: i32,
    current_gpu_level: i32,
    last_rejected: Option<(i32, i32)>,

    just_resumed: bool,
    paused: bool,
    ticks: u64,

    thermal_tx: broadcast::Sender<ThermalEvent>,
    bottleneck_tx: broadcast::Sender<BottleneckChangeEvent>,
}

impl std::fmt::Debug for PerformanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceController")
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("bottleneck", &self.bottleneck)
            .field("warning_level", &self.warning_level)
            .field("current_cpu_level", &self.current_cpu_level)
            .field("current_gpu_level", &self.current_gpu_level)
            .field("paused", &self.paused)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl PerformanceController {
    /// Starts a controller on the first candidate source that initializes.
    ///
    /// Candidates are tried in order; each one that fails to start is
    /// destroyed. Session time starts at zero. If no candidate starts the
    /// controller is inert.
    pub fn start(config: ControllerConfig, candidates: &[&dyn TelemetrySourceFactory]) -> Self {
        let mut controller = Self::inert(config);

        for factory in candidates {
            let mut source = factory.create();
            let events = EventSink::new();

            if source.start(events.clone(), Duration::ZERO) {
                tracing::info!(
                    source = factory.name(),
                    version = ?source.version().map(|v| v.to_string()),
                    max_cpu_level = source.max_cpu_performance_level(),
                    max_gpu_level = source.max_gpu_performance_level(),
                    "Telemetry source selected"
                );
                controller.attach(source, events);
                return controller;
            }

            tracing::debug!(source = factory.name(), "Telemetry source unavailable");
            source.destroy();
        }

        tracing::info!(
            candidates = candidates.len(),
            "No telemetry source available, controller inactive"
        );
        controller
    }

    /// Starts a controller on one already constructed source.
    pub fn with_source(config: ControllerConfig, mut source: Box<dyn TelemetrySource>) -> Self {
        let mut controller = Self::inert(config);
        let events = EventSink::new();

        if source.start(events.clone(), Duration::ZERO) {
            tracing::info!(source = source.name(), "Telemetry source started");
            controller.attach(source, events);
        } else {
            tracing::info!(source = source.name(), "Telemetry source failed to start");
            source.destroy();
        }
        controller
    }

    /// A controller without telemetry.
    pub fn inert(config: ControllerConfig) -> Self {
        let (thermal_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (bottleneck_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            overall_frame_time: RunningAverage::new(config.sample_window),
            gpu_frame_time: RunningAverage::new(config.sample_window),
            config,
            source: None,
            events: EventSink::new(),
            bottleneck: Bottleneck::Unknown,
            warning_level: WarningLevel::NoWarning,
            temperature_level: UNAVAILABLE,
            temperature_trend: 0.0,
            requested_cpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            requested_gpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            current_cpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            current_gpu_level: UNKNOWN_PERFORMANCE_LEVEL,
            last_rejected: None,
            just_resumed: false,
            paused: false,
            ticks: 0,
            thermal_tx,
            bottleneck_tx,
        }
    }

    fn attach(&mut self, source: Box<dyn TelemetrySource>, events: EventSink) {
        if self.requested_cpu_level == UNKNOWN_PERFORMANCE_LEVEL {
            self.requested_cpu_level = source.max_cpu_performance_level();
        }
        if self.requested_gpu_level == UNKNOWN_PERFORMANCE_LEVEL {
            self.requested_gpu_level = source.max_gpu_performance_level();
        }
        self.source = Some(source);
        self.events = events;
    }

    /// Runs one frame of the pipeline.
    ///
    /// # Arguments
    ///
    /// * `frame_time` - Wall time of the frame just rendered, in seconds
    /// * `now` - Session time
    pub fn tick(&mut self, frame_time: f32, now: Duration) -> TickReport {
        let Some(mut source) = self.source.take() else {
            return TickReport::default();
        };

        let report = self.tick_with(source.as_mut(), frame_time, now);
        self.source = Some(source);
        report
    }

    fn tick_with(
        &mut self,
        source: &mut dyn TelemetrySource,
        frame_time: f32,
        now: Duration,
    ) -> TickReport {
        let mut report = TickReport::default();

        source.update(now);

        if self.just_resumed {
            // The pause gap is not a frame.
            self.just_resumed = false;
        } else {
            self.add_frame_times(frame_time, source.gpu_frame_time());
        }

        if self.overall_frame_time.is_full() && self.gpu_frame_time.is_full() {
            report.bottleneck = self.update_bottleneck();
        }

        let (warning, active_cpu, active_gpu, temperature) = self.events.with_state(|s| {
            (
                s.warning_level,
                s.active_cpu_level,
                s.active_gpu_level,
                s.pending_temperature.take(),
            )
        });

        report.thermal = self.update_thermal(warning, temperature);

        if self.warning_level == WarningLevel::Throttling {
            self.current_cpu_level = UNKNOWN_PERFORMANCE_LEVEL;
            self.current_gpu_level = UNKNOWN_PERFORMANCE_LEVEL;
        } else {
            self.apply_requested_levels(source, active_cpu, active_gpu);
        }

        self.ticks += 1;
        if self.config.logging
            && self.config.stats_log_interval > 0
            && self.ticks % self.config.stats_log_interval == 0
        {
            self.log_stats(source);
        }

        report
    }

    fn add_frame_times(&mut self, frame_time: f32, gpu_frame_time: f32) {
        if frame_time.is_finite() && frame_time >= 0.0 {
            self.overall_frame_time.add_value(frame_time);
        } else {
            tracing::trace!(frame_time, "Ignoring invalid frame time");
        }

        if gpu_frame_time >= 0.0 && gpu_frame_time < self.config.max_valid_gpu_frame_time {
            self.gpu_frame_time.add_value(gpu_frame_time);
        }
    }

    fn update_bottleneck(&mut self) -> Option<BottleneckChangeEvent> {
        let bottleneck = classify(
            self.bottleneck,
            self.gpu_frame_time.average(),
            self.overall_frame_time.average(),
            &self.config.frame_rate,
            &self.config.thresholds,
        );
        if bottleneck == self.bottleneck {
            return None;
        }

        tracing::debug!(from = %self.bottleneck, to = %bottleneck, "Bottleneck changed");
        self.bottleneck = bottleneck;

        let event = BottleneckChangeEvent { bottleneck };
        // No subscribers is fine; the tick report carries the event too.
        let _ = self.bottleneck_tx.send(event);
        Some(event)
    }

    fn update_thermal(
        &mut self,
        warning: WarningLevel,
        temperature: Option<(f32, f32)>,
    ) -> Option<ThermalEvent> {
        let temperature_changed = temperature.is_some();
        if let Some((level, trend)) = temperature {
            self.temperature_level = level;
            self.temperature_trend = trend;
        }

        let warning_changed = warning != self.warning_level;
        if !warning_changed && !temperature_changed {
            return None;
        }

        if warning_changed {
            tracing::info!(
                from = %self.warning_level,
                to = %warning,
                "Thermal warning level changed"
            );
        }
        self.warning_level = warning;

        let event = ThermalEvent {
            warning_level: warning,
            temperature_level: self.temperature_level,
            temperature_trend: self.temperature_trend,
        };
        tracing::debug!(
            warning = %event.warning_level,
            temperature = format!("{:.2}", event.temperature_level),
            trend = format!("{:.2}", event.temperature_trend),
            "Thermal event"
        );
        let _ = self.thermal_tx.send(event);
        Some(event)
    }

    fn apply_requested_levels(
        &mut self,
        source: &mut dyn TelemetrySource,
        active_cpu: i32,
        active_gpu: i32,
    ) {
        let (cpu, gpu) = (self.requested_cpu_level, self.requested_gpu_level);
        if cpu == UNKNOWN_PERFORMANCE_LEVEL || gpu == UNKNOWN_PERFORMANCE_LEVEL {
            return;
        }
        if cpu == active_cpu && gpu == active_gpu {
            return;
        }

        self.events.with_state(|s| {
            s.active_cpu_level = cpu;
            s.active_gpu_level = gpu;
        });

        if source.set_performance_level(cpu, gpu) {
            tracing::debug!(cpu, gpu, "Performance level applied");
            self.current_cpu_level = cpu;
            self.current_gpu_level = gpu;
            self.last_rejected = None;
            return;
        }

        if self.last_rejected != Some((cpu, gpu)) {
            tracing::warn!(cpu, gpu, "Performance level request rejected");
            self.last_rejected = Some((cpu, gpu));
        }
        self.events.with_state(|s| {
            s.active_cpu_level = UNKNOWN_PERFORMANCE_LEVEL;
            s.active_gpu_level = UNKNOWN_PERFORMANCE_LEVEL;
        });
        self.current_cpu_level = UNKNOWN_PERFORMANCE_LEVEL;
        self.current_gpu_level = UNKNOWN_PERFORMANCE_LEVEL;
    }

    fn log_stats(&self, source: &dyn TelemetrySource) {
        let average_frame_time = self.average_frame_time();
        let fps = if average_frame_time > 0.0 {
            1.0 / average_frame_time
        } else {
            0.0
        };

        tracing::debug!(
            source = %source.stats(),
            cpu = format!("{}/{}", self.current_cpu_level, source.max_cpu_performance_level()),
            gpu = format!("{}/{}", self.current_gpu_level, source.max_gpu_performance_level()),
            warning = %self.warning_level,
            avg_gpu_ms = format!("{:.2}", self.average_gpu_frame_time() * 1000.0),
            current_gpu_ms = format!("{:.2}", self.current_gpu_frame_time() * 1000.0),
            avg_frame_ms = format!("{:.2}", average_frame_time * 1000.0),
            current_frame_ms = format!("{:.2}", self.current_frame_time() * 1000.0),
            bottleneck = %self.bottleneck,
            fps = format!("{:.1}", fps),
            "Performance statistics"
        );
    }

    /// The application went to the background.
    ///
    /// The overall frame time average is discarded and the source stops
    /// listening for callbacks.
    pub fn pause(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        source.application_pause();
        self.overall_frame_time.reset();
        self.paused = true;
        tracing::info!("Performance controller paused");
    }

    /// The application returned to the foreground.
    ///
    /// Clears the warning level, skips frame time accumulation on the next
    /// tick and lets the source refresh its readings synchronously.
    pub fn resume(&mut self, now: Duration) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        self.events.with_state(|s| s.warning_level = WarningLevel::NoWarning);
        source.application_resume(now);
        self.just_resumed = true;
        self.paused = false;
        tracing::info!("Performance controller resumed");
    }

    /// Stops and destroys the source; the controller becomes inert.
    pub fn shutdown(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            source.destroy();
            tracing::info!(source = source.name(), "Telemetry source destroyed");
        }
        self.current_cpu_level = UNKNOWN_PERFORMANCE_LEVEL;
        self.current_gpu_level = UNKNOWN_PERFORMANCE_LEVEL;
    }

    // ==================== Requests ====================

    /// Requests a CPU/GPU level pair, applied on the next tick.
    pub fn set_performance_requirements(&mut self, cpu_level: i32, gpu_level: i32) {
        tracing::debug!(cpu = cpu_level, gpu = gpu_level, "Performance requirements set");
        self.requested_cpu_level = cpu_level;
        self.requested_gpu_level = gpu_level;
    }

    pub fn set_cpu_level(&mut self, level: i32) {
        self.requested_cpu_level = level;
    }

    pub fn set_gpu_level(&mut self, level: i32) {
        self.requested_gpu_level = level;
    }

    pub fn set_logging(&mut self, enabled: bool) {
        self.config.logging = enabled;
    }

    // ==================== Properties ====================

    /// Whether a telemetry source is attached.
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name())
    }

    pub fn source_version(&self) -> Option<semver::Version> {
        self.source.as_ref().and_then(|s| s.version())
    }

    /// Ticks processed since start.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Average frame time over the sample window, or -1.
    pub fn average_frame_time(&self) -> f32 {
        average_or_unavailable(&self.overall_frame_time)
    }

    /// Most recent frame time, or -1.
    pub fn current_frame_time(&self) -> f32 {
        recent_or_unavailable(&self.overall_frame_time)
    }

    /// Average GPU frame time over the sample window, or -1.
    pub fn average_gpu_frame_time(&self) -> f32 {
        average_or_unavailable(&self.gpu_frame_time)
    }

    /// Most recent valid GPU frame time, or -1.
    pub fn current_gpu_frame_time(&self) -> f32 {
        recent_or_unavailable(&self.gpu_frame_time)
    }

    /// Requested CPU level.
    pub fn cpu_level(&self) -> i32 {
        self.requested_cpu_level
    }

    /// Requested GPU level.
    pub fn gpu_level(&self) -> i32 {
        self.requested_gpu_level
    }

    /// CPU level the device confirmed, or -1.
    pub fn current_cpu_level(&self) -> i32 {
        self.current_cpu_level
    }

    /// GPU level the device confirmed, or -1.
    pub fn current_gpu_level(&self) -> i32 {
        self.current_gpu_level
    }

    /// CPU level believed to be in effect, or -1.
    pub fn active_cpu_level(&self) -> i32 {
        self.events.with_state(|s| s.active_cpu_level)
    }

    /// GPU level believed to be in effect, or -1.
    pub fn active_gpu_level(&self) -> i32 {
        self.events.with_state(|s| s.active_gpu_level)
    }

    pub fn max_cpu_performance_level(&self) -> i32 {
        self.source
            .as_ref()
            .map_or(UNKNOWN_PERFORMANCE_LEVEL, |s| s.max_cpu_performance_level())
    }

    pub fn max_gpu_performance_level(&self) -> i32 {
        self.source
            .as_ref()
            .map_or(UNKNOWN_PERFORMANCE_LEVEL, |s| s.max_gpu_performance_level())
    }

    pub fn bottleneck(&self) -> Bottleneck {
        self.bottleneck
    }

    /// Warning level as of the last tick.
    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }

    /// Temperature level in `[0, 1]` as of the last tick, or -1.
    pub fn temperature_level(&self) -> f32 {
        self.temperature_level
    }

    /// Temperature trend in `[-1, 1]` as of the last tick.
    pub fn temperature_trend(&self) -> f32 {
        self.temperature_trend
    }

    // ==================== Notifications ====================

    /// Receives one [`ThermalEvent`] per tick in which the warning level or
    /// temperature changed.
    pub fn subscribe_thermal(&self) -> broadcast::Receiver<ThermalEvent> {
        self.thermal_tx.subscribe()
    }

    /// Receives one [`BottleneckChangeEvent`] per tick in which the
    /// classification changed.
    pub fn subscribe_bottleneck(&self) -> broadcast::Receiver<BottleneckChangeEvent> {
        self.bottleneck_tx.subscribe()
    }
}

impl Drop for PerformanceController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn average_or_unavailable(values: &RunningAverage) -> f32 {
    if values.is_empty() {
        UNAVAILABLE
    } else {
        values.average()
    }
}

fn recent_or_unavailable(values: &RunningAverage) -> f32 {
    if values.is_empty() {
        UNAVAILABLE
    } else {
        values.most_recent_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bottleneck::FrameRateSettings;
    use crate::sources::{ScriptedSourceHandle, ScriptedTelemetrySource};

    fn config() -> ControllerConfig {
        ControllerConfig::default()
            .with_sample_window(4)
            .with_frame_rate(FrameRateSettings::uncapped())
    }

    fn controller() -> (PerformanceController, ScriptedSourceHandle) {
        let source = ScriptedTelemetrySource::new();
        let handle = source.handle();
        let controller = PerformanceController::with_source(config(), Box::new(source));
        (controller, handle)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_requested_levels_default_to_max() {
        let (controller, _handle) = controller();
        assert!(controller.is_active());
        assert_eq!(controller.cpu_level(), 4);
        assert_eq!(controller.gpu_level(), 2);
        assert_eq!(controller.current_cpu_level(), UNKNOWN_PERFORMANCE_LEVEL);
    }

    #[test]
    fn test_first_tick_applies_levels_once() {
        let (mut controller, handle) = controller();

        controller.tick(0.016, ms(16));
        assert_eq!(controller.current_cpu_level(), 4);
        assert_eq!(controller.current_gpu_level(), 2);
        assert_eq!(controller.active_cpu_level(), 4);

        controller.tick(0.016, ms(32));
        assert_eq!(handle.set_level_calls(), 1);
    }

    #[test]
    fn test_rejected_level_rolls_back_and_retries() {
        let (mut controller, handle) = controller();
        handle.set_accepts_performance_level(false);

        controller.tick(0.016, ms(16));
        assert_eq!(controller.current_cpu_level(), UNKNOWN_PERFORMANCE_LEVEL);
        assert_eq!(controller.active_cpu_level(), UNKNOWN_PERFORMANCE_LEVEL);

        handle.set_accepts_performance_level(true);
        controller.tick(0.016, ms(32));
        assert_eq!(controller.current_cpu_level(), 4);
        assert_eq!(handle.set_level_calls(), 2);
    }

    #[test]
    fn test_level_disabled_triggers_reapply() {
        let (mut controller, handle) = controller();
        controller.tick(0.016, ms(16));
        assert_eq!(handle.set_level_calls(), 1);

        handle.emit_level_disabled();
        controller.tick(0.016, ms(32));
        assert_eq!(handle.set_level_calls(), 2);
        assert_eq!(controller.current_cpu_level(), 4);
    }

    #[test]
    fn test_gpu_frame_time_outliers_dropped() {
        let (mut controller, handle) = controller();
        assert_eq!(controller.average_gpu_frame_time(), UNAVAILABLE);

        handle.set_gpu_frame_time(UNAVAILABLE);
        controller.tick(0.016, ms(16));
        handle.set_gpu_frame_time(1.0);
        controller.tick(0.016, ms(32));
        assert_eq!(controller.current_gpu_frame_time(), UNAVAILABLE);

        handle.set_gpu_frame_time(0.010);
        controller.tick(0.016, ms(48));
        assert_eq!(controller.current_gpu_frame_time(), 0.010);
        assert_eq!(controller.average_gpu_frame_time(), 0.010);
        assert_eq!(controller.current_frame_time(), 0.016);
    }

    #[test]
    fn test_classification_waits_for_full_windows() {
        let (mut controller, handle) = controller();
        let mut events = controller.subscribe_bottleneck();
        handle.set_gpu_frame_time(0.005);

        for i in 0..3 {
            let report = controller.tick(0.020, ms(20 * (i + 1)));
            assert!(report.bottleneck.is_none());
        }
        assert_eq!(controller.bottleneck(), Bottleneck::Unknown);

        let report = controller.tick(0.020, ms(80));
        assert_eq!(
            report.bottleneck,
            Some(BottleneckChangeEvent {
                bottleneck: Bottleneck::Cpu
            })
        );
        assert_eq!(events.try_recv().unwrap().bottleneck, Bottleneck::Cpu);

        // Same classification: no further events.
        assert!(controller.tick(0.020, ms(100)).bottleneck.is_none());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_resume_skips_one_frame() {
        let (mut controller, handle) = controller();
        controller.tick(0.016, ms(16));
        controller.tick(0.016, ms(32));

        controller.pause();
        assert!(controller.is_paused());
        assert_eq!(controller.average_frame_time(), UNAVAILABLE);
        assert_eq!(handle.pause_calls(), 1);

        controller.resume(Duration::from_secs(30));
        assert_eq!(handle.resume_calls(), 1);
        controller.tick(29.0, Duration::from_secs(30));
        assert_eq!(controller.average_frame_time(), UNAVAILABLE);

        controller.tick(0.020, Duration::from_secs(30) + ms(20));
        assert_eq!(controller.average_frame_time(), 0.020);
    }

    #[test]
    fn test_resume_clears_warning() {
        let (mut controller, handle) = controller();
        handle.emit_warning(WarningLevel::Throttling);
        controller.tick(0.016, ms(16));
        assert_eq!(controller.warning_level(), WarningLevel::Throttling);

        controller.pause();
        controller.resume(Duration::from_secs(5));
        let report = controller.tick(0.016, Duration::from_secs(5));

        assert_eq!(controller.warning_level(), WarningLevel::NoWarning);
        assert_eq!(
            report.thermal.map(|e| e.warning_level),
            Some(WarningLevel::NoWarning)
        );
        assert_eq!(controller.current_cpu_level(), 4);
    }

    #[test]
    fn test_inert_controller() {
        let mut controller = PerformanceController::inert(config());
        assert!(!controller.is_active());

        let report = controller.tick(0.016, ms(16));
        assert!(report.is_empty());
        controller.pause();
        controller.resume(ms(100));

        assert_eq!(controller.average_frame_time(), UNAVAILABLE);
        assert_eq!(controller.max_cpu_performance_level(), UNKNOWN_PERFORMANCE_LEVEL);
        assert_eq!(controller.cpu_level(), UNKNOWN_PERFORMANCE_LEVEL);
        assert_eq!(controller.temperature_level(), UNAVAILABLE);
        assert_eq!(controller.ticks(), 0);
    }

    #[test]
    fn test_failed_source_is_destroyed() {
        let source = ScriptedTelemetrySource::new();
        let handle = source.handle();
        handle.set_start_succeeds(false);

        let controller = PerformanceController::with_source(config(), Box::new(source));
        assert!(!controller.is_active());
        assert!(handle.is_destroyed());
    }

    #[test]
    fn test_drop_destroys_source() {
        let (controller, handle) = controller();
        drop(controller);
        assert!(handle.is_destroyed());
    }

    #[test]
    fn test_invalid_frame_time_ignored() {
        let (mut controller, _handle) = controller();
        controller.tick(f32::NAN, ms(16));
        controller.tick(-0.5, ms(32));
        assert_eq!(controller.average_frame_time(), UNAVAILABLE);
        assert_eq!(controller.ticks(), 2);
    }
}
