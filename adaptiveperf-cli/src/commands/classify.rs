//! Classify command - evaluate the bottleneck rule for one set of timings.

use clap::ValueEnum;

use adaptiveperf::{classify, Bottleneck, BottleneckThresholds, FrameRateSettings};

use crate::error::CliError;

/// Previous classification selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum PreviousBottleneck {
    /// No classification yet
    Unknown,
    /// CPU bound
    Cpu,
    /// GPU bound
    Gpu,
    /// Limited by the target frame rate
    Target,
}

impl From<PreviousBottleneck> for Bottleneck {
    fn from(value: PreviousBottleneck) -> Self {
        match value {
            PreviousBottleneck::Unknown => Bottleneck::Unknown,
            PreviousBottleneck::Cpu => Bottleneck::Cpu,
            PreviousBottleneck::Gpu => Bottleneck::Gpu,
            PreviousBottleneck::Target => Bottleneck::TargetFrameRate,
        }
    }
}

/// Arguments for the classify command.
pub struct ClassifyArgs {
    pub previous: PreviousBottleneck,
    pub gpu_ms: f32,
    pub frame_ms: f32,
    pub target_fps: Option<u32>,
    pub vsync: Option<u32>,
    pub refresh_rate: Option<u32>,
}

/// Run the classify command.
pub fn run(args: ClassifyArgs) -> Result<(), CliError> {
    let result = evaluate(&args)?;
    println!("{}", result);
    Ok(())
}

fn evaluate(args: &ClassifyArgs) -> Result<Bottleneck, CliError> {
    if !args.frame_ms.is_finite() || args.frame_ms <= 0.0 {
        return Err(CliError::InvalidArgument(format!(
            "--frame-ms must be positive, got {}",
            args.frame_ms
        )));
    }

    let frame_rate = match (args.vsync, args.target_fps) {
        (Some(count), _) => FrameRateSettings::with_vsync(count, args.refresh_rate.unwrap_or(60)),
        (None, Some(fps)) => FrameRateSettings::with_target(fps),
        (None, None) => FrameRateSettings::uncapped(),
    };

    Ok(classify(
        args.previous.into(),
        args.gpu_ms / 1000.0,
        args.frame_ms / 1000.0,
        &frame_rate,
        &BottleneckThresholds::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(previous: PreviousBottleneck, gpu_ms: f32, frame_ms: f32) -> ClassifyArgs {
        ClassifyArgs {
            previous,
            gpu_ms,
            frame_ms,
            target_fps: None,
            vsync: None,
            refresh_rate: None,
        }
    }

    #[test]
    fn test_gpu_bound() {
        let result = evaluate(&args(PreviousBottleneck::Unknown, 19.0, 20.0)).unwrap();
        assert_eq!(result, Bottleneck::Gpu);
    }

    #[test]
    fn test_cpu_bound() {
        let result = evaluate(&args(PreviousBottleneck::Unknown, 10.0, 20.0)).unwrap();
        assert_eq!(result, Bottleneck::Cpu);
    }

    #[test]
    fn test_target_frame_rate() {
        let mut a = args(PreviousBottleneck::Unknown, 5.0, 33.4);
        a.target_fps = Some(30);
        assert_eq!(evaluate(&a).unwrap(), Bottleneck::TargetFrameRate);
    }

    #[test]
    fn test_non_positive_frame_time_rejected() {
        let result = evaluate(&args(PreviousBottleneck::Cpu, 5.0, 0.0));
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }
}
