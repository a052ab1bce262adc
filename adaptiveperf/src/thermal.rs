//! Temperature level and trend tracking.
//!
//! Devices report temperature as a small discrete level (for example 0..=7).
//! [`ThermalTracker`] polls that level through an [`AsyncValue`], normalizes
//! it to `[0, 1]` and derives a trend in `[-1, 1]` from how the level moves:
//!
//! | level change                                    | trend |
//! |-------------------------------------------------|-------|
//! | drop by more than one level                     | -1.0  |
//! | drop by one level                               | -0.5  |
//! | rise by more than one level                     |  1.0  |
//! | rise by one level shortly after another rise    |  0.8  |
//! | rise by one level                               |  0.5  |
//! | no change for longer than the quiet period      |  0.0  |
//!
//! A change is reported only when the level moves or the trend decays, so
//! consumers are not notified every tick.

use std::time::Duration;

use crate::async_poll::AsyncValue;
use crate::types::{MAX_TEMPERATURE_LEVEL, MIN_TEMPERATURE_LEVEL, UNAVAILABLE};

/// Default window in which a second one-level rise counts as sustained.
pub const DEFAULT_SUSTAINED_INCREASE_WINDOW: Duration = Duration::from_secs(60);

/// Default time without level changes after which the trend decays to zero.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Timing windows for trend detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalTiming {
    pub sustained_increase_window: Duration,
    pub quiet_period: Duration,
}

impl Default for ThermalTiming {
    fn default() -> Self {
        Self {
            sustained_increase_window: DEFAULT_SUSTAINED_INCREASE_WINDOW,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Valid range of a device's discrete temperature levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureScale {
    pub min_level: i32,
    pub max_level: i32,
}

impl TemperatureScale {
    pub fn new(min_level: i32, max_level: i32) -> Self {
        Self {
            min_level,
            max_level,
        }
    }

    pub fn contains(&self, level: i32) -> bool {
        level >= self.min_level && level <= self.max_level
    }

    /// Maps a raw level into `[0, 1]`, or [`UNAVAILABLE`] when out of range.
    pub fn normalize(&self, level: i32) -> f32 {
        if !self.contains(level) || self.max_level <= 0 {
            return UNAVAILABLE;
        }
        (level as f32 / self.max_level as f32).clamp(MIN_TEMPERATURE_LEVEL, MAX_TEMPERATURE_LEVEL)
    }
}

/// Snapshot of the tracked thermal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalState {
    /// Normalized level in `[0, 1]`, or [`UNAVAILABLE`].
    pub level: f32,
    /// Trend in `[-1, 1]`.
    pub trend: f32,
    /// When the level was last read.
    pub last_value_at: Duration,
    /// When the level last changed.
    pub last_change_at: Duration,
}

/// Trend after the discrete level moved by `delta` (non-zero).
///
/// `since_previous_change` is the time between this change and the one
/// before it; `previous_trend` is the trend held until now.
pub fn trend_for_change(
    previous_trend: f32,
    delta: i32,
    since_previous_change: Duration,
    timing: &ThermalTiming,
) -> f32 {
    match delta {
        d if d < -1 => -1.0,
        -1 => -0.5,
        d if d > 1 => 1.0,
        1 if previous_trend > 0.0 && since_previous_change < timing.sustained_increase_window => {
            0.8
        }
        1 => 0.5,
        _ => previous_trend,
    }
}

/// Tracks one temperature sensor polled in the background.
#[derive(Debug)]
pub struct ThermalTracker {
    sensor: AsyncValue<i32>,
    scale: TemperatureScale,
    timing: ThermalTiming,
    trend: f32,
}

impl ThermalTracker {
    pub fn new(sensor: AsyncValue<i32>, scale: TemperatureScale, timing: ThermalTiming) -> Self {
        Self {
            sensor,
            scale,
            timing,
            trend: 0.0,
        }
    }

    /// Polls the sensor and updates the trend.
    ///
    /// Returns `true` when the level changed or the trend decayed to zero.
    pub fn update(&mut self, now: Duration) -> bool {
        let old_level = *self.sensor.value();
        let old_change_at = self.sensor.change_timestamp();

        if self.sensor.poll(now) {
            let new_level = *self.sensor.value();
            let since_previous_change =
                self.sensor.change_timestamp().saturating_sub(old_change_at);

            self.trend = if self.scale.contains(old_level) && self.scale.contains(new_level) {
                let delta = new_level - old_level;
                trend_for_change(self.trend, delta, since_previous_change, &self.timing)
            } else {
                // Coming from or going to "unavailable" says nothing about direction.
                0.0
            };

            tracing::debug!(
                from = old_level,
                to = new_level,
                trend = self.trend,
                "Temperature level changed"
            );
            return true;
        }

        if self.trend != 0.0 && now.saturating_sub(old_change_at) > self.timing.quiet_period {
            tracing::debug!(
                level = old_level,
                quiet_secs = self.timing.quiet_period.as_secs(),
                "Temperature constant, trend reset"
            );
            self.trend = 0.0;
            return true;
        }

        false
    }

    /// Reads the sensor synchronously without touching the trend.
    pub fn refresh(&mut self, now: Duration) -> bool {
        self.sensor.sync_poll(now)
    }

    /// Clears the trend and reads the sensor synchronously.
    ///
    /// Used after resuming, when the pause gap makes the trend meaningless.
    pub fn reset(&mut self, now: Duration) {
        self.trend = 0.0;
        self.sensor.sync_poll(now);
    }

    /// Normalized temperature level, or [`UNAVAILABLE`].
    pub fn temperature_level(&self) -> f32 {
        self.scale.normalize(*self.sensor.value())
    }

    pub fn trend(&self) -> f32 {
        self.trend
    }

    /// The last raw level read from the device.
    pub fn raw_level(&self) -> i32 {
        *self.sensor.value()
    }

    pub fn scale(&self) -> TemperatureScale {
        self.scale
    }

    pub fn state(&self) -> ThermalState {
        ThermalState {
            level: self.temperature_level(),
            trend: self.trend,
            last_value_at: self.sensor.last_completed_at(),
            last_change_at: self.sensor.change_timestamp(),
        }
    }
}
