//! Simulate command - drive a controller with a scripted telemetry source.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use adaptiveperf::config::MAX_SAMPLE_WINDOW;
use adaptiveperf::sources::ScriptedTelemetrySource;
use adaptiveperf::{
    Bottleneck, BottleneckChangeEvent, ControllerConfig, FrameRateSettings, PerformanceController,
    ThermalEvent, WarningLevel, UNAVAILABLE,
};

use super::schedule::{TemperatureAt, WarningAt};
use crate::error::CliError;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub frames: u64,
    pub frame_ms: f32,
    pub gpu_ms: Option<f32>,
    pub config: Option<PathBuf>,
    pub sample_window: Option<usize>,
    pub target_fps: Option<u32>,
    pub vsync: Option<u32>,
    pub refresh_rate: Option<u32>,
    pub desktop: bool,
    pub cpu_level: Option<i32>,
    pub gpu_level: Option<i32>,
    pub reject_levels: bool,
    pub warnings: Vec<WarningAt>,
    pub temperatures: Vec<TemperatureAt>,
    pub json: bool,
}

/// One notification observed during the simulation.
#[derive(Debug, Serialize)]
struct Record {
    frame: u64,
    #[serde(flatten)]
    event: RecordedEvent,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RecordedEvent {
    Thermal(ThermalEvent),
    Bottleneck(BottleneckChangeEvent),
}

/// State of the controller after the last frame.
#[derive(Debug, Serialize)]
struct Summary {
    frames: u64,
    bottleneck: Bottleneck,
    warning_level: WarningLevel,
    temperature_level: f32,
    temperature_trend: f32,
    current_cpu_level: i32,
    current_gpu_level: i32,
    max_cpu_level: i32,
    max_gpu_level: i32,
    average_frame_ms: f32,
    average_gpu_frame_ms: f32,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    if !args.frame_ms.is_finite() || args.frame_ms <= 0.0 {
        return Err(CliError::InvalidArgument(format!(
            "--frame-ms must be a positive number, got {}",
            args.frame_ms
        )));
    }
    if let Some(gpu_ms) = args.gpu_ms.filter(|ms| !ms.is_finite()) {
        return Err(CliError::InvalidArgument(format!(
            "--gpu-ms must be a finite number, got {}",
            gpu_ms
        )));
    }

    let config = build_config(&args)?;
    tracing::debug!(?config, "Simulation config");

    let handle = ScriptedTelemetrySource::new().handle();
    handle.set_accepts_performance_level(!args.reject_levels);
    handle.set_gpu_frame_time(args.gpu_ms.map_or(UNAVAILABLE, |ms| ms / 1000.0));

    let factory = handle.factory();
    let mut controller = PerformanceController::start(config, &[&factory]);

    if args.cpu_level.is_some() || args.gpu_level.is_some() {
        let cpu = args.cpu_level.unwrap_or(controller.cpu_level());
        let gpu = args.gpu_level.unwrap_or(controller.gpu_level());
        controller.set_performance_requirements(cpu, gpu);
    }

    let frame_time = args.frame_ms / 1000.0;
    let mut records = Vec::new();

    for frame in 0..args.frames {
        for warning in args.warnings.iter().filter(|w| w.frame == frame) {
            handle.emit_warning(warning.level);
        }
        for temperature in args.temperatures.iter().filter(|t| t.frame == frame) {
            handle.emit_temperature(temperature.level, temperature.trend);
        }

        let now = Duration::from_secs_f64(f64::from(frame_time) * (frame + 1) as f64);
        let report = controller.tick(frame_time, now);

        if let Some(event) = report.thermal {
            records.push(Record {
                frame,
                event: RecordedEvent::Thermal(event),
            });
        }
        if let Some(event) = report.bottleneck {
            records.push(Record {
                frame,
                event: RecordedEvent::Bottleneck(event),
            });
        }
    }

    let summary = Summary {
        frames: args.frames,
        bottleneck: controller.bottleneck(),
        warning_level: controller.warning_level(),
        temperature_level: controller.temperature_level(),
        temperature_trend: controller.temperature_trend(),
        current_cpu_level: controller.current_cpu_level(),
        current_gpu_level: controller.current_gpu_level(),
        max_cpu_level: controller.max_cpu_performance_level(),
        max_gpu_level: controller.max_gpu_performance_level(),
        average_frame_ms: to_ms(controller.average_frame_time()),
        average_gpu_frame_ms: to_ms(controller.average_gpu_frame_time()),
    };

    if args.json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_text(&records, &summary);
    }
    Ok(())
}

fn build_config(args: &SimulateArgs) -> Result<ControllerConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::from_ini_file(path)?,
        None => ControllerConfig::default(),
    };

    if let Some(window) = args.sample_window {
        if window == 0 || window > MAX_SAMPLE_WINDOW {
            return Err(CliError::InvalidArgument(format!(
                "--sample-window must be between 1 and {}",
                MAX_SAMPLE_WINDOW
            )));
        }
        config = config.with_sample_window(window);
    }

    if args.desktop {
        config.frame_rate.mobile_platform = false;
    }
    if let Some(fps) = args.target_fps {
        config.frame_rate.target_frame_rate = Some(fps);
    }
    match (args.vsync, args.refresh_rate) {
        (Some(count), Some(hz)) => {
            config.frame_rate = FrameRateSettings {
                mobile_platform: config.frame_rate.mobile_platform,
                target_frame_rate: config.frame_rate.target_frame_rate,
                ..FrameRateSettings::with_vsync(count, hz)
            };
        }
        (Some(count), None) => config.frame_rate.vsync_count = count,
        (None, Some(hz)) => config.frame_rate.display_refresh_rate = Some(hz),
        (None, None) => {}
    }

    Ok(config)
}

fn to_ms(seconds: f32) -> f32 {
    if seconds < 0.0 {
        UNAVAILABLE
    } else {
        seconds * 1000.0
    }
}

fn print_text(records: &[Record], summary: &Summary) {
    for record in records {
        match &record.event {
            RecordedEvent::Thermal(event) => println!(
                "frame {:>6}  thermal     warning={} temperature={:.2} trend={:.2}",
                record.frame,
                event.warning_level,
                event.temperature_level,
                event.temperature_trend
            ),
            RecordedEvent::Bottleneck(event) => println!(
                "frame {:>6}  bottleneck  {}",
                record.frame, event.bottleneck
            ),
        }
    }

    println!();
    println!("Simulated {} frames", summary.frames);
    println!("  Bottleneck:    {}", summary.bottleneck);
    println!("  Warning level: {}", summary.warning_level);
    println!(
        "  Temperature:   {:.2} (trend {:.2})",
        summary.temperature_level, summary.temperature_trend
    );
    println!(
        "  CPU level:     {}/{}",
        summary.current_cpu_level, summary.max_cpu_level
    );
    println!(
        "  GPU level:     {}/{}",
        summary.current_gpu_level, summary.max_gpu_level
    );
    println!("  Avg frame:     {:.2} ms", summary.average_frame_ms);
    println!("  Avg GPU frame: {:.2} ms", summary.average_gpu_frame_ms);
}
