//! Controller and telemetry configuration.
//!
//! Every setting has a default matching the tuned values; an INI file only
//! needs to name what it overrides.
//!
//! ```ini
//! [controller]
//! sample_window = 100
//! max_valid_gpu_frame_time = 1.0
//! stats_log_interval = 50
//! logging = true
//!
//! [frame_rate]
//! vsync_count = 0
//! target_frame_rate = 60
//! display_refresh_rate = 60
//! mobile_platform = true
//!
//! [bottleneck]
//! cpu_enter = 0.20
//! cpu_stay = 0.18
//!
//! [thermal]
//! sustained_increase_window_secs = 60
//! quiet_period_secs = 300
//!
//! [telemetry]
//! skin_refresh_interval_secs = 2.7
//! worker_name = telemetry-worker
//! ```
//!
//! Unknown sections and keys are ignored; malformed values are errors.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::bottleneck::{BottleneckThresholds, FrameRateSettings};
use crate::error::ConfigError;
use crate::running_average::DEFAULT_SAMPLE_WINDOW;
use crate::sources::PolledSourceConfig;

// ==================== Controller Defaults ====================

/// GPU frame times at or above this many seconds are dropped as outliers.
pub const DEFAULT_MAX_VALID_GPU_FRAME_TIME: f32 = 1.0;

/// Ticks between two statistics log lines.
pub const DEFAULT_STATS_LOG_INTERVAL: u64 = 50;

/// Largest accepted `sample_window`; each average preallocates its window.
pub const MAX_SAMPLE_WINDOW: usize = 100_000;

const SECTION_CONTROLLER: &str = "controller";
const SECTION_FRAME_RATE: &str = "frame_rate";
const SECTION_BOTTLENECK: &str = "bottleneck";
const SECTION_THERMAL: &str = "thermal";
const SECTION_TELEMETRY: &str = "telemetry";

/// Configuration of a [`PerformanceController`](crate::PerformanceController).
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Number of frames in the frame time running averages.
    ///
    /// Classification starts once both averages hold this many samples.
    /// Default: 100.
    pub sample_window: usize,

    /// GPU frame times outside `[0, max_valid_gpu_frame_time)` are dropped.
    /// Default: 1.0 s.
    pub max_valid_gpu_frame_time: f32,

    /// Ticks between statistics log lines; 0 disables them. Default: 50.
    pub stats_log_interval: u64,

    /// Target frame rate inputs for the frame rate limit check.
    pub frame_rate: FrameRateSettings,

    /// Enter/stay thresholds of the bottleneck classifier.
    pub thresholds: BottleneckThresholds,

    /// Enables periodic statistics logging.
    pub logging: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
            max_valid_gpu_frame_time: DEFAULT_MAX_VALID_GPU_FRAME_TIME,
            stats_log_interval: DEFAULT_STATS_LOG_INTERVAL,
            frame_rate: FrameRateSettings::default(),
            thresholds: BottleneckThresholds::default(),
            logging: true,
        }
    }
}

impl ControllerConfig {
    pub fn with_sample_window(mut self, frames: usize) -> Self {
        self.sample_window = frames.max(1);
        self
    }

    pub fn with_max_valid_gpu_frame_time(mut self, seconds: f32) -> Self {
        self.max_valid_gpu_frame_time = seconds;
        self
    }

    pub fn with_stats_log_interval(mut self, ticks: u64) -> Self {
        self.stats_log_interval = ticks;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRateSettings) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_thresholds(mut self, thresholds: BottleneckThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Loads overrides from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_ini_str(&read_file(path.as_ref())?)
    }

    /// Loads overrides from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = parse_ini(text)?;
        let mut config = Self::default();

        let section = SECTION_CONTROLLER;
        if let Some(frames) = get_parsed::<usize>(&ini, section, "sample_window")? {
            if frames == 0 {
                return Err(invalid(section, "sample_window", "0", "must be at least 1"));
            }
            if frames > MAX_SAMPLE_WINDOW {
                return Err(invalid(
                    section,
                    "sample_window",
                    &frames.to_string(),
                    &format!("must be at most {}", MAX_SAMPLE_WINDOW),
                ));
            }
            config.sample_window = frames;
        }
        if let Some(seconds) = get_parsed::<f32>(&ini, section, "max_valid_gpu_frame_time")? {
            if !(seconds > 0.0) {
                return Err(invalid(
                    section,
                    "max_valid_gpu_frame_time",
                    &seconds.to_string(),
                    "must be positive",
                ));
            }
            config.max_valid_gpu_frame_time = seconds;
        }
        if let Some(ticks) = get_parsed::<u64>(&ini, section, "stats_log_interval")? {
            config.stats_log_interval = ticks;
        }
        if let Some(enabled) = get_bool(&ini, section, "logging")? {
            config.logging = enabled;
        }

        let section = SECTION_FRAME_RATE;
        if let Some(count) = get_parsed::<u32>(&ini, section, "vsync_count")? {
            config.frame_rate.vsync_count = count;
        }
        if let Some(fps) = get_optional_rate(&ini, section, "target_frame_rate")? {
            config.frame_rate.target_frame_rate = fps;
        }
        if let Some(hz) = get_optional_rate(&ini, section, "display_refresh_rate")? {
            config.frame_rate.display_refresh_rate = hz;
        }
        if let Some(mobile) = get_bool(&ini, section, "mobile_platform")? {
            config.frame_rate.mobile_platform = mobile;
        }

        let thresholds = &mut config.thresholds;
        for (key, slot) in [
            ("target_enter", &mut thresholds.target_enter),
            ("target_stay", &mut thresholds.target_stay),
            ("cpu_enter", &mut thresholds.cpu_enter),
            ("cpu_stay", &mut thresholds.cpu_stay),
            ("gpu_enter", &mut thresholds.gpu_enter),
            ("gpu_stay", &mut thresholds.gpu_stay),
        ] {
            if let Some(factor) = get_parsed::<f32>(&ini, SECTION_BOTTLENECK, key)? {
                if !(0.0..=1.0).contains(&factor) {
                    return Err(invalid(
                        SECTION_BOTTLENECK,
                        key,
                        &factor.to_string(),
                        "must be between 0 and 1",
                    ));
                }
                *slot = factor;
            }
        }

        Ok(config)
    }
}

impl PolledSourceConfig {
    /// Loads overrides from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_ini_str(&read_file(path.as_ref())?)
    }

    /// Loads overrides from the `[thermal]` and `[telemetry]` sections.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = parse_ini(text)?;
        let mut config = Self::default();

        let section = SECTION_THERMAL;
        if let Some(window) = get_duration(&ini, section, "sustained_increase_window_secs")? {
            config.thermal_timing.sustained_increase_window = window;
        }
        if let Some(quiet) = get_duration(&ini, section, "quiet_period_secs")? {
            config.thermal_timing.quiet_period = quiet;
        }

        let section = SECTION_TELEMETRY;
        if let Some(interval) = get_duration(&ini, section, "skin_refresh_interval_secs")? {
            config.skin_refresh_interval = interval;
        }
        if let Some(interval) = get_duration(&ini, section, "pst_refresh_interval_secs")? {
            config.pst_refresh_interval = interval;
        }
        if let Some(interval) = get_duration(&ini, section, "gpu_refresh_interval_secs")? {
            config.gpu_refresh_interval = interval;
        }
        if let Some(name) = get_str(&ini, section, "worker_name") {
            if name.is_empty() {
                return Err(invalid(section, "worker_name", name, "must not be empty"));
            }
            config.worker_name = name.to_string();
        }
        if let Some(name) = get_str(&ini, section, "scene_name") {
            config.scene_name = name.to_string();
        }

        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_ini(text: &str) -> Result<Ini, ConfigError> {
    Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn get_str<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
}

fn get_parsed<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match get_str(ini, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, raw, "not a valid number")),
    }
}

fn get_bool(ini: &Ini, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
    match get_str(ini, section, key) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(invalid(section, key, raw, "expected true or false")),
        },
    }
}

/// A rate where `none`, empty or a negative number means "not set".
fn get_optional_rate(
    ini: &Ini,
    section: &str,
    key: &str,
) -> Result<Option<Option<u32>>, ConfigError> {
    match get_str(ini, section, key) {
        None => Ok(None),
        Some(raw) if raw.is_empty() || raw.eq_ignore_ascii_case("none") => Ok(Some(None)),
        Some(raw) => match raw.parse::<i64>() {
            Ok(value) if value < 0 => Ok(Some(None)),
            Ok(value) => u32::try_from(value)
                .map(|v| Some(Some(v)))
                .map_err(|_| invalid(section, key, raw, "out of range")),
            Err(_) => Err(invalid(section, key, raw, "not a valid frame rate")),
        },
    }
}

fn get_duration(ini: &Ini, section: &str, key: &str) -> Result<Option<Duration>, ConfigError> {
    match get_parsed::<f64>(ini, section, key)? {
        None => Ok(None),
        Some(secs) => Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
            invalid(
                section,
                key,
                &secs.to_string(),
                "must be a non-negative number of seconds",
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::DEFAULT_WORKER_NAME;
    use std::io::Write;

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(
            ControllerConfig::from_ini_str("").unwrap(),
            ControllerConfig::default()
        );
        assert_eq!(
            PolledSourceConfig::from_ini_str("").unwrap(),
            PolledSourceConfig::default()
        );
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.sample_window, 100);
        assert_eq!(config.max_valid_gpu_frame_time, 1.0);
        assert_eq!(config.stats_log_interval, 50);
        assert!(config.logging);
        assert_eq!(config.frame_rate.effective_target_frame_rate(), Some(30));
    }

    #[test]
    fn test_controller_overrides() {
        let text = "\
[controller]
sample_window = 20
stats_log_interval = 0
logging = no

[frame_rate]
vsync_count = 2
display_refresh_rate = 120
target_frame_rate = none

[bottleneck]
cpu_enter = 0.25
gpu_stay = 0.15

[unrelated]
anything = goes
";
        let config = ControllerConfig::from_ini_str(text).unwrap();
        assert_eq!(config.sample_window, 20);
        assert_eq!(config.stats_log_interval, 0);
        assert!(!config.logging);
        assert_eq!(config.frame_rate.vsync_count, 2);
        assert_eq!(config.frame_rate.display_refresh_rate, Some(120));
        assert_eq!(config.frame_rate.target_frame_rate, None);
        assert_eq!(config.frame_rate.effective_target_frame_rate(), Some(60));
        assert_eq!(config.thresholds.cpu_enter, 0.25);
        assert_eq!(config.thresholds.gpu_stay, 0.15);
        assert_eq!(config.thresholds.cpu_stay, 0.18);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let text = "[controller]\nsample_window = lots\n";
        let err = ControllerConfig::from_ini_str(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "sample_window"
        ));

        let err = ControllerConfig::from_ini_str("[controller]\nsample_window = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ControllerConfig::from_ini_str("[bottleneck]\ncpu_enter = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("cpu_enter"));

        let text = "[frame_rate]\nmobile_platform = maybe\n";
        let err = ControllerConfig::from_ini_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_telemetry_overrides() {
        let text = "\
[thermal]
sustained_increase_window_secs = 30
quiet_period_secs = 120.5

[telemetry]
skin_refresh_interval_secs = 1.5
gpu_refresh_interval_secs = 0
worker_name = sdk-poller
";
        let config = PolledSourceConfig::from_ini_str(text).unwrap();
        assert_eq!(
            config.thermal_timing.sustained_increase_window,
            Duration::from_secs(30)
        );
        assert_eq!(
            config.thermal_timing.quiet_period,
            Duration::from_secs_f64(120.5)
        );
        assert_eq!(config.skin_refresh_interval, Duration::from_secs_f64(1.5));
        assert_eq!(config.gpu_refresh_interval, Duration::ZERO);
        assert_eq!(config.worker_name, "sdk-poller");
        assert_ne!(config.worker_name, DEFAULT_WORKER_NAME);
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let text = "[thermal]\nquiet_period_secs = -5\n";
        let err = PolledSourceConfig::from_ini_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_out_of_range_duration_is_rejected() {
        for text in [
            "[thermal]\nquiet_period_secs = 1e30\n",
            "[telemetry]\nskin_refresh_interval_secs = 1e300\n",
            "[thermal]\nsustained_increase_window_secs = inf\n",
        ] {
            let err = PolledSourceConfig::from_ini_str(text).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }), "{}", text);
        }
    }

    #[test]
    fn test_oversized_sample_window_is_rejected() {
        let text = "[controller]\nsample_window = 1000000000000000000\n";
        let err = ControllerConfig::from_ini_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let config = ControllerConfig::from_ini_str(&format!(
            "[controller]\nsample_window = {}\n",
            MAX_SAMPLE_WINDOW
        ))
        .unwrap();
        assert_eq!(config.sample_window, MAX_SAMPLE_WINDOW);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller]\nsample_window = 8").unwrap();

        let config = ControllerConfig::from_ini_file(file.path()).unwrap();
        assert_eq!(config.sample_window, 8);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ini");

        let err = ControllerConfig::from_ini_file(&path).unwrap_err();
        match err {
            ConfigError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
