//! adaptiveperf CLI - offline driver for the performance controller.
//!
//! Runs the controller against a scripted telemetry source so frame timings
//! and device events can be replayed without a device.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::classify::{ClassifyArgs, PreviousBottleneck};
use commands::schedule::{parse_temperature, parse_warning, TemperatureAt, WarningAt};
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "adaptiveperf")]
#[command(version, about = "Adaptive performance controller simulator", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay frame timings and scripted device events through a controller
    Simulate {
        /// Number of frames to run
        #[arg(short = 'n', long, default_value_t = 300)]
        frames: u64,

        /// Overall frame time in milliseconds
        #[arg(long, default_value_t = 16.7)]
        frame_ms: f32,

        /// GPU frame time in milliseconds (omit for no GPU timing)
        #[arg(long)]
        gpu_ms: Option<f32>,

        /// Controller configuration file (INI)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Frames in each running average
        #[arg(long)]
        sample_window: Option<usize>,

        /// Target frame rate when vsync is off
        #[arg(long)]
        target_fps: Option<u32>,

        /// Vertical blanks per frame (0 = vsync off)
        #[arg(long)]
        vsync: Option<u32>,

        /// Display refresh rate in Hz
        #[arg(long)]
        refresh_rate: Option<u32>,

        /// Treat the platform as desktop (no implicit 30 fps cap)
        #[arg(long)]
        desktop: bool,

        /// Requested CPU performance level
        #[arg(long, allow_hyphen_values = true)]
        cpu_level: Option<i32>,

        /// Requested GPU performance level
        #[arg(long, allow_hyphen_values = true)]
        gpu_level: Option<i32>,

        /// Make the device refuse every performance level
        #[arg(long)]
        reject_levels: bool,

        /// Warning change before a frame, FRAME:LEVEL (repeatable)
        #[arg(long = "warning", value_parser = parse_warning)]
        warnings: Vec<WarningAt>,

        /// Temperature change before a frame, FRAME:LEVEL:TREND (repeatable)
        #[arg(long = "temperature", value_parser = parse_temperature, allow_hyphen_values = true)]
        temperatures: Vec<TemperatureAt>,

        /// Print events and summary as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Classify a single pair of average frame timings
    Classify {
        /// Average GPU frame time in milliseconds
        #[arg(long)]
        gpu_ms: f32,

        /// Average overall frame time in milliseconds
        #[arg(long)]
        frame_ms: f32,

        /// Previous classification
        #[arg(long, value_enum, default_value = "unknown")]
        previous: PreviousBottleneck,

        /// Target frame rate when vsync is off
        #[arg(long)]
        target_fps: Option<u32>,

        /// Vertical blanks per frame
        #[arg(long)]
        vsync: Option<u32>,

        /// Display refresh rate in Hz
        #[arg(long)]
        refresh_rate: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();
    adaptiveperf::logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Simulate {
            frames,
            frame_ms,
            gpu_ms,
            config,
            sample_window,
            target_fps,
            vsync,
            refresh_rate,
            desktop,
            cpu_level,
            gpu_level,
            reject_levels,
            warnings,
            temperatures,
            json,
        } => commands::simulate::run(SimulateArgs {
            frames,
            frame_ms,
            gpu_ms,
            config,
            sample_window,
            target_fps,
            vsync,
            refresh_rate,
            desktop,
            cpu_level,
            gpu_level,
            reject_levels,
            warnings,
            temperatures,
            json,
        }),
        Commands::Classify {
            gpu_ms,
            frame_ms,
            previous,
            target_fps,
            vsync,
            refresh_rate,
        } => commands::classify::run(ClassifyArgs {
            previous,
            gpu_ms,
            frame_ms,
            target_fps,
            vsync,
            refresh_rate,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_schedule() {
        let cli = Cli::try_parse_from([
            "adaptiveperf",
            "simulate",
            "--frames",
            "50",
            "--warning",
            "10:throttling",
            "--temperature",
            "20:0.5:-0.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate {
                frames,
                warnings,
                temperatures,
                ..
            } => {
                assert_eq!(frames, 50);
                assert_eq!(warnings.len(), 1);
                assert_eq!(temperatures[0].trend, -0.5);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::try_parse_from([
            "adaptiveperf",
            "-v",
            "classify",
            "--gpu-ms",
            "8",
            "--frame-ms",
            "16",
            "--previous",
            "cpu",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Classify {
                previous: PreviousBottleneck::Cpu,
                ..
            }
        ));
    }
}
