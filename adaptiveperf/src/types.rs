//! Shared value types, sentinels and event payloads.
//!
//! # Sentinel convention
//!
//! Every "no data" condition in this crate is expressed with the value `-1`:
//!
//! - performance levels use [`UNKNOWN_PERFORMANCE_LEVEL`]
//! - frame times and temperature levels use [`UNAVAILABLE`]
//!
//! Comparisons against these constants are used instead of `Option` so that
//! the polled properties stay plain numbers for per-frame consumers.

use serde::Serialize;

/// Value of a CPU/GPU level when no level is currently in effect.
///
/// Reported while the device is throttling, before the first successful
/// apply, or after the device rejected or reset a level.
pub const UNKNOWN_PERFORMANCE_LEVEL: i32 = -1;

/// Value reported for frame times and temperature levels that are not available.
pub const UNAVAILABLE: f32 = -1.0;

/// Lowest valid normalized temperature level.
pub const MIN_TEMPERATURE_LEVEL: f32 = 0.0;

/// Highest valid normalized temperature level.
pub const MAX_TEMPERATURE_LEVEL: f32 = 1.0;

/// Lowest valid CPU performance level.
pub const MIN_CPU_PERFORMANCE_LEVEL: i32 = 0;

/// Lowest valid GPU performance level.
pub const MIN_GPU_PERFORMANCE_LEVEL: i32 = 0;

/// Thermal warning level reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WarningLevel {
    /// Normal operation.
    #[default]
    NoWarning,
    /// Adjustments are required to avoid thermal throttling.
    ThrottlingImminent,
    /// The device is throttling; requested levels are not applied.
    Throttling,
}

impl WarningLevel {
    /// Maps the raw listener code used by vendor SDKs (0, 1, 2).
    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => Some(WarningLevel::NoWarning),
            1 => Some(WarningLevel::ThrottlingImminent),
            2 => Some(WarningLevel::Throttling),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::NoWarning => "NoWarning",
            WarningLevel::ThrottlingImminent => "ThrottlingImminent",
            WarningLevel::Throttling => "Throttling",
        }
    }
}

impl std::fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WarningLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nowarning" | "none" | "0" => Ok(WarningLevel::NoWarning),
            "throttlingimminent" | "imminent" | "1" => Ok(WarningLevel::ThrottlingImminent),
            "throttling" | "2" => Ok(WarningLevel::Throttling),
            other => Err(format!("unknown warning level '{}'", other)),
        }
    }
}

/// What currently limits the achieved frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Bottleneck {
    /// Not enough data, or the timings are ambiguous.
    #[default]
    Unknown,
    /// Frame rate is limited by CPU processing.
    Cpu,
    /// Frame rate is limited by GPU processing.
    Gpu,
    /// Frame rate is limited by the configured target frame rate.
    ///
    /// The application should consider lowering its performance requirements.
    TargetFrameRate,
}

impl Bottleneck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bottleneck::Unknown => "Unknown",
            Bottleneck::Cpu => "CPU",
            Bottleneck::Gpu => "GPU",
            Bottleneck::TargetFrameRate => "TargetFrameRate",
        }
    }
}

impl std::fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coalesced thermal notification, fired at most once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermalEvent {
    pub warning_level: WarningLevel,
    /// Temperature level in `[0, 1]`, or [`UNAVAILABLE`].
    pub temperature_level: f32,
    /// Temperature trend in `[-1, 1]`.
    ///
    /// `1` is a rapid increase, `0` a constant temperature, `-1` a rapid
    /// decrease.
    pub temperature_trend: f32,
}

/// Bottleneck notification, fired at most once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BottleneckChangeEvent {
    pub bottleneck: Bottleneck,
}

/// Clamps a raw temperature level reported by a source.
///
/// Values above 1 saturate, negative values and NaN become [`UNAVAILABLE`].
pub fn clamp_temperature_level(value: f32) -> f32 {
    if value > MAX_TEMPERATURE_LEVEL {
        MAX_TEMPERATURE_LEVEL
    } else if value >= MIN_TEMPERATURE_LEVEL {
        value
    } else {
        UNAVAILABLE
    }
}

/// Clamps a raw temperature trend into `[-1, 1]`; NaN becomes 0.
pub fn clamp_temperature_trend(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
