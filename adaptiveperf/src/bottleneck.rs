//! Frame-rate bottleneck classification.
//!
//! Compares the smoothed GPU frame time against the smoothed overall frame
//! time to guess whether the CPU, the GPU or the frame-rate cap limits the
//! achieved frame rate. This is a heuristic, not a profiler signal.
//!
//! # State Machine
//!
//! ```text
//!                  overall within cap band (2% to enter, 3% to stay)
//!        ┌──────────────────────────────────────────────────► TargetFrameRate
//!        │
//! any ───┤ gpu >= overall ─────────────────────────────────► Gpu
//!        │
//!        │ gpu < overall, delta = overall - gpu
//!        ├── delta > 20% of overall (18% to stay) ─────────► Cpu
//!        ├── delta < 10% of overall (12% to stay) ─────────► Gpu
//!        └── otherwise ────────────────────────────────────► Unknown
//! ```
//!
//! Leaving a classification requires a larger swing than entering it, which
//! damps flapping caused by sampling noise.

use crate::types::Bottleneck;

/// Frame rate assumed when the display refresh rate is unknown.
pub const DEFAULT_DISPLAY_REFRESH_RATE: u32 = 60;

/// Frame rate assumed on mobile when no explicit target is set.
pub const MOBILE_DEFAULT_TARGET_FRAME_RATE: u32 = 30;

/// Hysteresis thresholds for [`classify`].
///
/// The defaults are empirically tuned; keep them unless a device profile
/// has been measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BottleneckThresholds {
    /// Fraction of the target frame time counted as "at the cap" when
    /// entering `TargetFrameRate`.
    pub target_enter: f32,
    /// Same band while already `TargetFrameRate`.
    pub target_stay: f32,
    /// Minimum GPU idle fraction of the frame to enter `Cpu`.
    pub cpu_enter: f32,
    /// Minimum GPU idle fraction to stay `Cpu`.
    pub cpu_stay: f32,
    /// Maximum GPU idle fraction to enter `Gpu`.
    pub gpu_enter: f32,
    /// Maximum GPU idle fraction to stay `Gpu`.
    pub gpu_stay: f32,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            target_enter: 0.02,
            target_stay: 0.03,
            cpu_enter: 0.20,
            cpu_stay: 0.18,
            gpu_enter: 0.10,
            gpu_stay: 0.12,
        }
    }
}

/// Display and frame pacing configuration used to derive the frame-rate cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateSettings {
    /// Number of vertical blanks per frame; `0` disables vsync.
    pub vsync_count: u32,
    /// Application frame-rate target when vsync is off; `None` if unset.
    pub target_frame_rate: Option<u32>,
    /// Display refresh rate in Hz; `None` or `0` when unknown.
    pub display_refresh_rate: Option<u32>,
    /// Apply the mobile default cap when vsync is off and no target is set.
    pub mobile_platform: bool,
}

impl Default for FrameRateSettings {
    fn default() -> Self {
        Self {
            vsync_count: 0,
            target_frame_rate: None,
            display_refresh_rate: None,
            mobile_platform: true,
        }
    }
}

impl FrameRateSettings {
    /// Settings with no frame-rate cap at all.
    pub fn uncapped() -> Self {
        Self {
            vsync_count: 0,
            target_frame_rate: None,
            display_refresh_rate: None,
            mobile_platform: false,
        }
    }

    /// Settings capped at `fps` with vsync off.
    pub fn with_target(fps: u32) -> Self {
        Self {
            target_frame_rate: Some(fps),
            ..Self::uncapped()
        }
    }

    /// Settings synced to a display of `refresh_rate` Hz every `vsync_count` blanks.
    pub fn with_vsync(vsync_count: u32, refresh_rate: u32) -> Self {
        Self {
            vsync_count,
            display_refresh_rate: Some(refresh_rate),
            ..Self::uncapped()
        }
    }

    /// The frame rate the application is capped at, `None` when uncapped.
    pub fn effective_target_frame_rate(&self) -> Option<u32> {
        let rate = if self.vsync_count == 0 {
            match self.target_frame_rate {
                Some(target) => Some(target),
                None if self.mobile_platform => Some(MOBILE_DEFAULT_TARGET_FRAME_RATE),
                None => None,
            }
        } else {
            let refresh = self
                .display_refresh_rate
                .filter(|&hz| hz > 0)
                .unwrap_or(DEFAULT_DISPLAY_REFRESH_RATE);
            Some(refresh / self.vsync_count)
        };

        // A zero rate has no meaningful frame time.
        rate.filter(|&fps| fps > 0)
    }

    /// Target frame time in seconds, `None` when uncapped.
    pub fn target_frame_time(&self) -> Option<f32> {
        self.effective_target_frame_rate().map(|fps| 1.0 / fps as f32)
    }
}

/// Classifies the current bottleneck from smoothed frame times (seconds).
///
/// Rules are checked in order: target frame rate, GPU busy for the whole
/// frame, CPU, then GPU. Each uses the wider "stay" band when `previous`
/// already holds that result and the narrower "enter" band otherwise.
///
/// Hysteresis only keeps a result inside its own band. With the default
/// thresholds a `Cpu` result whose GPU idle share falls to 11% of the frame
/// becomes `Unknown`: it is below the 18% CPU stay band and above the 10%
/// GPU enter band. It does not remain `Cpu`.
///
/// ```
/// use adaptiveperf::{classify, Bottleneck, BottleneckThresholds, FrameRateSettings};
///
/// let uncapped = FrameRateSettings::uncapped();
/// let thresholds = BottleneckThresholds::default();
/// let next = classify(Bottleneck::Cpu, 0.0178, 0.020, &uncapped, &thresholds);
/// assert_eq!(next, Bottleneck::Unknown);
/// ```
pub fn classify(
    previous: Bottleneck,
    average_gpu_frame_time: f32,
    average_overall_frame_time: f32,
    frame_rate: &FrameRateSettings,
    thresholds: &BottleneckThresholds,
) -> Bottleneck {
    let band = if previous == Bottleneck::TargetFrameRate {
        thresholds.target_stay
    } else {
        thresholds.target_enter
    };
    if let Some(target) = frame_rate.target_frame_time() {
        if hitting_frame_rate_limit(average_overall_frame_time, target, band) {
            return Bottleneck::TargetFrameRate;
        }
    }

    if average_gpu_frame_time >= average_overall_frame_time {
        // GPU busy for the whole frame.
        return Bottleneck::Gpu;
    }

    let delta = average_overall_frame_time - average_gpu_frame_time;

    let cpu_factor = if previous == Bottleneck::Cpu {
        thresholds.cpu_stay
    } else {
        thresholds.cpu_enter
    };
    if delta > cpu_factor * average_overall_frame_time {
        return Bottleneck::Cpu;
    }

    let gpu_factor = if previous == Bottleneck::Gpu {
        thresholds.gpu_stay
    } else {
        thresholds.gpu_enter
    };
    if delta < gpu_factor * average_overall_frame_time {
        return Bottleneck::Gpu;
    }

    Bottleneck::Unknown
}

fn hitting_frame_rate_limit(actual: f32, target: f32, band: f32) -> bool {
    actual <= target || actual - target < band * target
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uncapped(previous: Bottleneck, gpu: f32, overall: f32) -> Bottleneck {
        classify(
            previous,
            gpu,
            overall,
            &FrameRateSettings::uncapped(),
            &BottleneckThresholds::default(),
        )
    }

    #[test]
    fn test_gpu_idle_most_of_frame_is_cpu() {
        // delta = 0.015 > 0.20 * 0.020
        assert_eq!(uncapped(Bottleneck::Unknown, 0.005, 0.020), Bottleneck::Cpu);
    }

    #[test]
    fn test_gpu_busy_whole_frame_is_gpu() {
        assert_eq!(uncapped(Bottleneck::Unknown, 0.020, 0.020), Bottleneck::Gpu);
        assert_eq!(uncapped(Bottleneck::Cpu, 0.025, 0.020), Bottleneck::Gpu);
    }

    #[test]
    fn test_small_gpu_idle_is_gpu() {
        // delta = 0.001 < 0.10 * 0.020
        assert_eq!(uncapped(Bottleneck::Unknown, 0.019, 0.020), Bottleneck::Gpu);
    }

    #[test]
    fn test_ambiguous_zone_is_unknown() {
        // delta = 0.003 = 15% of the frame: between 10% and 20%
        assert_eq!(uncapped(Bottleneck::Unknown, 0.017, 0.020), Bottleneck::Unknown);
    }

    #[test]
    fn test_cpu_stays_cpu_inside_exit_band() {
        // delta = 19% of the frame: below 20% (enter) but above 18% (stay)
        let overall = 0.020;
        let gpu = overall * (1.0 - 0.19);
        assert_eq!(uncapped(Bottleneck::Unknown, gpu, overall), Bottleneck::Unknown);
        assert_eq!(uncapped(Bottleneck::Cpu, gpu, overall), Bottleneck::Cpu);
    }

    #[test]
    fn test_gpu_stays_gpu_inside_exit_band() {
        // delta = 11% of the frame: above 10% (enter) but below 12% (stay)
        let overall = 0.020;
        let gpu = overall * (1.0 - 0.11);
        assert_eq!(uncapped(Bottleneck::Unknown, gpu, overall), Bottleneck::Unknown);
        assert_eq!(uncapped(Bottleneck::Gpu, gpu, overall), Bottleneck::Gpu);
    }

    #[test]
    fn test_cpu_not_dropped_to_gpu_between_gpu_thresholds() {
        // Prime CPU, then feed deltas straddling the 10% and 12% GPU bands.
        let overall = 0.020;
        let mut state = uncapped(Bottleneck::Unknown, 0.005, overall);
        assert_eq!(state, Bottleneck::Cpu);

        for idle in [0.19f32, 0.185] {
            state = uncapped(state, overall * (1.0 - idle), overall);
            assert_eq!(state, Bottleneck::Cpu, "idle fraction {}", idle);
        }

        // 11% idle: would stay GPU but does not newly enter GPU.
        state = uncapped(state, overall * (1.0 - 0.11), overall);
        assert_eq!(state, Bottleneck::Unknown);

        // 9% idle enters GPU.
        state = uncapped(state, overall * (1.0 - 0.09), overall);
        assert_eq!(state, Bottleneck::Gpu);
    }

    #[test]
    fn test_target_frame_rate_band() {
        let settings = FrameRateSettings::with_target(30);
        let thresholds = BottleneckThresholds::default();
        let target = 1.0 / 30.0;

        // At or under the cap.
        assert_eq!(
            classify(Bottleneck::Unknown, 0.005, target, &settings, &thresholds),
            Bottleneck::TargetFrameRate
        );
        // 2.5% over: outside the 2% entry band, inside the 3% stay band.
        let overall = target * 1.025;
        assert_eq!(
            classify(Bottleneck::Unknown, 0.005, overall, &settings, &thresholds),
            Bottleneck::Cpu
        );
        assert_eq!(
            classify(Bottleneck::TargetFrameRate, 0.005, overall, &settings, &thresholds),
            Bottleneck::TargetFrameRate
        );
    }

    #[test]
    fn test_effective_target_frame_rate() {
        assert_eq!(FrameRateSettings::uncapped().effective_target_frame_rate(), None);
        assert_eq!(FrameRateSettings::default().effective_target_frame_rate(), Some(30));
        assert_eq!(FrameRateSettings::with_target(45).effective_target_frame_rate(), Some(45));
        assert_eq!(FrameRateSettings::with_target(0).effective_target_frame_rate(), None);
        assert_eq!(FrameRateSettings::with_vsync(2, 120).effective_target_frame_rate(), Some(60));
        assert_eq!(FrameRateSettings::with_vsync(1, 0).effective_target_frame_rate(), Some(60));

        let unknown_display = FrameRateSettings {
            vsync_count: 2,
            ..FrameRateSettings::uncapped()
        };
        assert_eq!(unknown_display.effective_target_frame_rate(), Some(30));
    }

    #[test]
    fn test_target_frame_time() {
        let t = FrameRateSettings::with_target(50).target_frame_time().unwrap();
        assert!((t - 0.02).abs() < 1e-6);
        assert!(FrameRateSettings::uncapped().target_frame_time().is_none());
    }

    proptest! {
        #[test]
        fn prop_gpu_bound_when_gpu_exceeds_overall(
            overall in 0.001f32..0.5,
            extra in 0.0f32..0.5,
            previous in prop_oneof![
                Just(Bottleneck::Unknown),
                Just(Bottleneck::Cpu),
                Just(Bottleneck::Gpu),
                Just(Bottleneck::TargetFrameRate),
            ],
        ) {
            prop_assert_eq!(uncapped(previous, overall + extra, overall), Bottleneck::Gpu);
        }

        #[test]
        fn prop_cpu_classification_is_sticky(
            overall in 0.005f32..0.1,
            idle in 0.0f32..1.0,
        ) {
            let gpu = overall * (1.0 - idle);
            // Anything classified CPU from scratch stays CPU when re-evaluated.
            if uncapped(Bottleneck::Unknown, gpu, overall) == Bottleneck::Cpu {
                prop_assert_eq!(uncapped(Bottleneck::Cpu, gpu, overall), Bottleneck::Cpu);
            }
        }
    }
}
