//! AdaptivePerf - frame-time bottleneck detection and thermal-aware
//! performance level control for mobile devices.
//!
//! A [`PerformanceController`] is ticked once per rendered frame. It keeps
//! running averages of overall and GPU frame times, classifies what limits
//! the frame rate, tracks the device's thermal warning level and temperature
//! and applies the requested CPU/GPU performance levels through a
//! [`TelemetrySource`].
//!
//! ```
//! use std::time::Duration;
//! use adaptiveperf::{ControllerConfig, PerformanceController, ScriptedTelemetrySource};
//!
//! let source = ScriptedTelemetrySource::new();
//! let mut controller =
//!     PerformanceController::with_source(ControllerConfig::default(), Box::new(source));
//!
//! controller.set_performance_requirements(2, 1);
//! controller.tick(0.016, Duration::from_millis(16));
//! assert_eq!(controller.current_cpu_level(), 2);
//! ```

pub mod async_poll;
pub mod bottleneck;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod running_average;
pub mod source;
pub mod sources;
pub mod thermal;
pub mod types;

pub use bottleneck::{classify, BottleneckThresholds, FrameRateSettings};
pub use config::ControllerConfig;
pub use controller::{PerformanceController, TickReport};
pub use error::{ConfigError, WorkerError};
pub use running_average::RunningAverage;
pub use source::{
    EventSink, FnSourceFactory, TelemetryEvent, TelemetrySource, TelemetrySourceFactory,
};
pub use sources::{
    PolledSourceConfig, PolledTelemetrySource, ScriptedSourceHandle, ScriptedTelemetrySource,
    TelemetryBackend,
};
pub use thermal::{ThermalState, ThermalTiming, ThermalTracker};
pub use types::{
    Bottleneck, BottleneckChangeEvent, ThermalEvent, WarningLevel, UNAVAILABLE,
    UNKNOWN_PERFORMANCE_LEVEL,
};
