//! Telemetry source for slow, vendor-style thermal SDKs.
//!
//! Vendor SDK calls can take several milliseconds each, so every reading is
//! an [`AsyncValue`] refreshed on one shared [`TelemetryWorker`] and adopted
//! on the next tick.
//!
//! # SDK version negotiation
//!
//! ```text
//! initialize ──► version ≥ 1.6 ──► main sensor: skin temperature (0..=7)
//!            ├─► version ≥ 1.5 ──► main sensor: PST level        (0..=6)
//!            └─► older/unknown ──► terminate, not initialized
//! ```
//!
//! # Lifecycle
//!
//! - `start`: synchronous temperature read, then one temperature event with
//!   trend 0.
//! - `application_pause`: listener unregistered.
//! - `application_resume`: listener registered again, level reported as
//!   disabled, trend cleared, synchronous read and a temperature event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use semver::Version;

use crate::async_poll::{AsyncValue, TelemetryWorker, WorkerHooks};
use crate::source::{EventSink, TelemetrySource};
use crate::thermal::{TemperatureScale, ThermalTiming, ThermalTracker};
use crate::types::{WarningLevel, UNAVAILABLE};

/// Default refresh interval of the skin temperature reading.
pub const DEFAULT_SKIN_REFRESH_INTERVAL: Duration = Duration::from_millis(2700);

/// Default refresh interval of the PST level reading.
pub const DEFAULT_PST_REFRESH_INTERVAL: Duration = Duration::from_millis(3300);

/// GPU frame time is re-read every tick.
pub const DEFAULT_GPU_REFRESH_INTERVAL: Duration = Duration::ZERO;

/// Default name of the telemetry worker thread.
pub const DEFAULT_WORKER_NAME: &str = "telemetry-worker";

/// Default scene name passed along with level requests.
pub const DEFAULT_SCENE_NAME: &str = "adaptiveperf";

/// Highest skin temperature level of SDK 1.6 and later.
const SKIN_TEMPERATURE_MAX_LEVEL: i32 = 7;

/// Highest PST level of SDK 1.5.
const PST_MAX_LEVEL: i32 = 6;

const SKIN_SENSOR_MIN_VERSION: Version = Version::new(1, 6, 0);
const PST_SENSOR_MIN_VERSION: Version = Version::new(1, 5, 0);

/// Configuration of a [`PolledTelemetrySource`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolledSourceConfig {
    /// Minimum time between skin temperature reads.
    pub skin_refresh_interval: Duration,
    /// Minimum time between PST level reads.
    pub pst_refresh_interval: Duration,
    /// Minimum time between GPU frame time reads.
    pub gpu_refresh_interval: Duration,
    /// Name of the background worker thread.
    pub worker_name: String,
    /// Scene name sent with level requests.
    pub scene_name: String,
    /// Trend detection windows.
    pub thermal_timing: ThermalTiming,
}

impl Default for PolledSourceConfig {
    fn default() -> Self {
        Self {
            skin_refresh_interval: DEFAULT_SKIN_REFRESH_INTERVAL,
            pst_refresh_interval: DEFAULT_PST_REFRESH_INTERVAL,
            gpu_refresh_interval: DEFAULT_GPU_REFRESH_INTERVAL,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            scene_name: DEFAULT_SCENE_NAME.to_string(),
            thermal_timing: ThermalTiming::default(),
        }
    }
}

impl PolledSourceConfig {
    pub fn with_skin_refresh_interval(mut self, interval: Duration) -> Self {
        self.skin_refresh_interval = interval;
        self
    }

    pub fn with_pst_refresh_interval(mut self, interval: Duration) -> Self {
        self.pst_refresh_interval = interval;
        self
    }

    pub fn with_gpu_refresh_interval(mut self, interval: Duration) -> Self {
        self.gpu_refresh_interval = interval;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene_name = name.into();
        self
    }

    pub fn with_thermal_timing(mut self, timing: ThermalTiming) -> Self {
        self.thermal_timing = timing;
        self
    }
}

/// Raw vendor SDK surface.
///
/// Calls may be slow and are made from the telemetry worker thread as well
/// as the tick thread. A failing call should return its sentinel; panics are
/// caught and logged.
pub trait TelemetryBackend: Send + Sync + 'static {
    /// Initializes the SDK. Returns `false` if it is unavailable.
    fn initialize(&self) -> bool;

    fn terminate(&self);

    /// SDK version string, e.g. `"1.6"`.
    fn version(&self) -> Option<String>;

    /// Starts delivering warning and timeout callbacks to `listener`.
    fn register_listener(&self, listener: BackendListener);

    fn unregister_listener(&self);

    /// Skin temperature level, or -1.
    fn skin_temperature_level(&self) -> i32;

    /// PST level, or -1.
    fn pst_level(&self) -> i32;

    /// GPU frame time in milliseconds, or a negative value.
    fn gpu_frame_time_ms(&self) -> f64;

    fn set_level_with_scene(&self, scene: &str, cpu_level: i32, gpu_level: i32) -> bool;

    fn max_cpu_performance_level(&self) -> i32 {
        3
    }

    /// Prepares the telemetry worker thread for SDK calls.
    ///
    /// Runs on the worker thread before it executes any read.
    fn attach_worker_thread(&self) {}

    /// Undoes [`attach_worker_thread`](Self::attach_worker_thread) on the
    /// worker thread after its last read.
    fn detach_worker_thread(&self) {}

    fn max_gpu_performance_level(&self) -> i32 {
        3
    }
}

/// Callback target handed to [`TelemetryBackend::register_listener`].
#[derive(Debug, Clone)]
pub struct BackendListener {
    events: EventSink,
}

impl BackendListener {
    pub fn new(events: EventSink) -> Self {
        Self { events }
    }

    /// Raw warning codes: 0 no warning, 1 throttling imminent, 2 throttling.
    pub fn on_high_temp_warning(&self, code: i32) {
        match WarningLevel::from_raw(code) {
            Some(level) => self.events.warning_level_changed(level),
            None => tracing::debug!(code, "Ignoring unknown warning code"),
        }
    }

    /// The SDK released the applied level after its sustained timeout.
    pub fn on_released_by_timeout(&self) {
        self.events.performance_level_disabled();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainSensor {
    SkinTemperature,
    PstLevel,
}

impl MainSensor {
    fn for_version(version: &Version) -> Option<Self> {
        if *version >= SKIN_SENSOR_MIN_VERSION {
            Some(MainSensor::SkinTemperature)
        } else if *version >= PST_SENSOR_MIN_VERSION {
            Some(MainSensor::PstLevel)
        } else {
            None
        }
    }

    fn scale(self) -> TemperatureScale {
        match self {
            MainSensor::SkinTemperature => TemperatureScale::new(0, SKIN_TEMPERATURE_MAX_LEVEL),
            MainSensor::PstLevel => TemperatureScale::new(0, PST_MAX_LEVEL),
        }
    }
}

/// Readings of an initialized source.
#[derive(Debug)]
struct Sensors {
    main: MainSensor,
    thermal: ThermalTracker,
    /// PST level polled for diagnostics when skin temperature is the main sensor.
    secondary_pst: Option<AsyncValue<i32>>,
    gpu_time_ms: AsyncValue<f64>,
}

/// [`TelemetrySource`] over a slow [`TelemetryBackend`].
pub struct PolledTelemetrySource<B: TelemetryBackend> {
    backend: Arc<B>,
    config: PolledSourceConfig,
    worker: Option<Arc<TelemetryWorker>>,
    sensors: Option<Sensors>,
    events: Option<EventSink>,
    listener: Option<BackendListener>,
    version: Option<Version>,
    initialized: bool,
}

impl<B: TelemetryBackend> std::fmt::Debug for PolledTelemetrySource<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolledTelemetrySource")
            .field("initialized", &self.initialized)
            .field("version", &self.version)
            .field("main_sensor", &self.sensors.as_ref().map(|s| s.main))
            .finish()
    }
}

impl<B: TelemetryBackend> PolledTelemetrySource<B> {
    pub fn new(backend: B, config: PolledSourceConfig) -> Self {
        Self::from_shared(Arc::new(backend), config)
    }

    /// Creates a source over a backend shared with the caller.
    pub fn from_shared(backend: Arc<B>, config: PolledSourceConfig) -> Self {
        Self {
            backend,
            config,
            worker: None,
            sensors: None,
            events: None,
            listener: None,
            version: None,
            initialized: false,
        }
    }

    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, PolledSourceConfig::default())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &PolledSourceConfig {
        &self.config
    }

    /// Normalized level of the main temperature sensor, or -1.
    pub fn temperature_level(&self) -> f32 {
        self.sensors
            .as_ref()
            .map_or(UNAVAILABLE, |s| s.thermal.temperature_level())
    }

    pub fn temperature_trend(&self) -> f32 {
        self.sensors.as_ref().map_or(0.0, |s| s.thermal.trend())
    }

    fn negotiate_version(&mut self) -> Option<MainSensor> {
        let raw = guarded("version", None, || self.backend.version());
        let Some(version) = raw.as_deref().and_then(parse_version) else {
            tracing::warn!(version = ?raw, "Unrecognized telemetry SDK version");
            return None;
        };

        let main = MainSensor::for_version(&version);
        if main.is_none() {
            tracing::warn!(version = %version, "Telemetry SDK too old");
        }
        self.version = Some(version);
        main
    }

    fn build_sensors(&self, worker: &Arc<TelemetryWorker>, main: MainSensor) -> Sensors {
        let skin = {
            let backend = Arc::clone(&self.backend);
            AsyncValue::new(
                Arc::clone(worker),
                -1,
                self.config.skin_refresh_interval,
                move || guarded("skin temperature", -1, || backend.skin_temperature_level()),
            )
        };
        let pst = {
            let backend = Arc::clone(&self.backend);
            AsyncValue::new(
                Arc::clone(worker),
                -1,
                self.config.pst_refresh_interval,
                move || guarded("PST level", -1, || backend.pst_level()),
            )
        };
        let gpu_time_ms = {
            let backend = Arc::clone(&self.backend);
            AsyncValue::new(
                Arc::clone(worker),
                -1.0,
                self.config.gpu_refresh_interval,
                move || guarded("GPU frame time", -1.0, || backend.gpu_frame_time_ms()),
            )
        };

        let (main_value, secondary_pst) = match main {
            MainSensor::SkinTemperature => (skin, Some(pst)),
            MainSensor::PstLevel => (pst, None),
        };

        Sensors {
            main,
            thermal: ThermalTracker::new(main_value, main.scale(), self.config.thermal_timing),
            secondary_pst,
            gpu_time_ms,
        }
    }

    fn worker_hooks(&self) -> WorkerHooks {
        let attach = Arc::clone(&self.backend);
        let detach = Arc::clone(&self.backend);
        WorkerHooks::new()
            .on_attach(move || guarded("attach worker", (), || attach.attach_worker_thread()))
            .on_detach(move || guarded("detach worker", (), || detach.detach_worker_thread()))
    }

    /// Reads every temperature sensor synchronously, optionally clearing the trend.
    fn refresh_temperature(&mut self, now: Duration, reset_trend: bool) {
        if let Some(sensors) = &mut self.sensors {
            if let Some(pst) = &mut sensors.secondary_pst {
                pst.sync_poll(now);
            }
            if reset_trend {
                sensors.thermal.reset(now);
            } else {
                sensors.thermal.refresh(now);
            }
        }
    }

    fn emit_temperature(&self) {
        if let (Some(events), Some(sensors)) = (&self.events, &self.sensors) {
            let thermal = &sensors.thermal;
            events.temperature_changed(thermal.temperature_level(), thermal.trend());
        }
    }
}

impl<B: TelemetryBackend> TelemetrySource for PolledTelemetrySource<B> {
    fn name(&self) -> &str {
        "polled"
    }

    fn start(&mut self, events: EventSink, now: Duration) -> bool {
        if self.initialized {
            return true;
        }

        if !guarded("initialize", false, || self.backend.initialize()) {
            tracing::info!("Telemetry SDK not available");
            return false;
        }

        let Some(main) = self.negotiate_version() else {
            guarded("terminate", (), || self.backend.terminate());
            return false;
        };

        let worker = match TelemetryWorker::spawn_with_hooks(
            self.config.worker_name.clone(),
            self.worker_hooks(),
        ) {
            Ok(worker) => Arc::new(worker),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot start telemetry worker");
                guarded("terminate", (), || self.backend.terminate());
                return false;
            }
        };

        self.sensors = Some(self.build_sensors(&worker, main));
        self.worker = Some(worker);

        let listener = BackendListener::new(events.clone());
        guarded("register listener", (), || self.backend.register_listener(listener.clone()));
        self.listener = Some(listener);
        self.events = Some(events);
        self.initialized = true;

        tracing::info!(
            version = ?self.version.as_ref().map(|v| v.to_string()),
            sensor = ?main,
            "Telemetry SDK initialized"
        );

        self.refresh_temperature(now, false);
        self.emit_temperature();
        true
    }

    fn stop(&mut self) {}

    fn destroy(&mut self) {
        // Drain and detach the worker before the SDK goes away.
        self.sensors = None;
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }

        if self.initialized {
            guarded("unregister listener", (), || self.backend.unregister_listener());
            guarded("terminate", (), || self.backend.terminate());
            self.initialized = false;
        }

        self.events = None;
        self.listener = None;
    }

    fn update(&mut self, now: Duration) {
        let Some(sensors) = &mut self.sensors else {
            return;
        };

        sensors.gpu_time_ms.poll(now);
        let temperature_changed = sensors.thermal.update(now);
        if let Some(pst) = &mut sensors.secondary_pst {
            pst.poll(now);
        }

        if temperature_changed {
            self.emit_temperature();
        }
    }

    fn gpu_frame_time(&self) -> f32 {
        let Some(sensors) = &self.sensors else {
            return UNAVAILABLE;
        };
        let ms = *sensors.gpu_time_ms.value();
        if ms >= 0.0 {
            (ms / 1000.0) as f32
        } else {
            UNAVAILABLE
        }
    }

    fn set_performance_level(&mut self, cpu_level: i32, gpu_level: i32) -> bool {
        if !self.initialized {
            return false;
        }
        let scene = self.config.scene_name.as_str();
        guarded("set level", false, || {
            self.backend.set_level_with_scene(scene, cpu_level, gpu_level)
        })
    }

    fn max_cpu_performance_level(&self) -> i32 {
        self.backend.max_cpu_performance_level()
    }

    fn max_gpu_performance_level(&self) -> i32 {
        self.backend.max_gpu_performance_level()
    }

    fn application_pause(&mut self) {
        if self.initialized {
            guarded("unregister listener", (), || self.backend.unregister_listener());
        }
    }

    fn application_resume(&mut self, now: Duration) {
        if self.initialized {
            if let Some(listener) = self.listener.clone() {
                guarded("register listener", (), || self.backend.register_listener(listener));
            }
        }
        if let Some(events) = &self.events {
            events.performance_level_disabled();
        }

        self.refresh_temperature(now, true);
        self.emit_temperature();
    }

    fn version(&self) -> Option<Version> {
        self.version.clone()
    }

    fn stats(&self) -> String {
        let Some(sensors) = &self.sensors else {
            return "not initialized".to_string();
        };
        let pst = match (sensors.main, &sensors.secondary_pst) {
            (MainSensor::PstLevel, _) => sensors.thermal.raw_level(),
            (MainSensor::SkinTemperature, Some(pst)) => *pst.value(),
            (MainSensor::SkinTemperature, None) => -1,
        };
        let skin = match sensors.main {
            MainSensor::SkinTemperature => sensors.thermal.raw_level(),
            MainSensor::PstLevel => -1,
        };
        format!("skin_temperature={} pst_level={}", skin, pst)
    }
}

impl<B: TelemetryBackend> Drop for PolledTelemetrySource<B> {
    fn drop(&mut self) {
        if self.initialized || self.worker.is_some() {
            self.destroy();
        }
    }
}

/// Parses SDK version strings such as `"1.6"`, `"2"` or `"1.5.0.12"`.
pub(crate) fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }

    let mut parts = [0u64; 3];
    let mut count = 0;
    for (slot, part) in raw.split('.').enumerate() {
        let number = part.parse::<u64>().ok()?;
        if slot < parts.len() {
            parts[slot] = number;
        }
        count += 1;
    }
    if count == 0 || count > 4 {
        return None;
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Runs a backend call, turning a panic into `fallback`.
fn guarded<T>(call: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(call, "Telemetry backend call failed");
            fallback
        }
    }
}
