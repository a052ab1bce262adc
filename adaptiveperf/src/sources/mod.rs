//! Telemetry source implementations.
//!
//! - [`ScriptedTelemetrySource`] is driven by hand through a
//!   [`ScriptedSourceHandle`]; used by tests and the simulator.
//! - [`PolledTelemetrySource`] adapts a slow vendor-style
//!   [`TelemetryBackend`] by polling it on a background worker.

mod polled;
mod scripted;

pub use polled::{
    BackendListener, PolledSourceConfig, PolledTelemetrySource, TelemetryBackend,
    DEFAULT_GPU_REFRESH_INTERVAL, DEFAULT_PST_REFRESH_INTERVAL, DEFAULT_SCENE_NAME,
    DEFAULT_SKIN_REFRESH_INTERVAL, DEFAULT_WORKER_NAME,
};
pub use scripted::{
    ScriptedSourceFactory, ScriptedSourceHandle, ScriptedTelemetrySource, SCRIPTED_MAX_CPU_LEVEL,
    SCRIPTED_MAX_GPU_LEVEL,
};
