//! Scripted event schedules for the simulate command.
//!
//! Entries are given on the command line as colon-separated fields:
//!
//! - `--warning FRAME:LEVEL`, e.g. `120:throttling`
//! - `--temperature FRAME:LEVEL:TREND`, e.g. `200:0.8:0.5`

use adaptiveperf::WarningLevel;

/// Warning level change injected before the given frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarningAt {
    pub frame: u64,
    pub level: WarningLevel,
}

/// Temperature change injected before the given frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureAt {
    pub frame: u64,
    pub level: f32,
    pub trend: f32,
}

/// Parses `FRAME:LEVEL`.
pub fn parse_warning(s: &str) -> Result<WarningAt, String> {
    let (frame, level) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FRAME:LEVEL, got '{}'", s))?;

    Ok(WarningAt {
        frame: parse_frame(frame)?,
        level: level.parse()?,
    })
}

/// Parses `FRAME:LEVEL:TREND`.
pub fn parse_temperature(s: &str) -> Result<TemperatureAt, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(frame), Some(level), Some(trend)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected FRAME:LEVEL:TREND, got '{}'", s));
    };

    let level: f32 = level
        .trim()
        .parse()
        .map_err(|_| format!("invalid temperature level '{}'", level))?;
    let trend: f32 = trend
        .trim()
        .parse()
        .map_err(|_| format!("invalid temperature trend '{}'", trend))?;

    if !(-1.0..=1.0).contains(&trend) {
        return Err(format!("temperature trend {} outside [-1, 1]", trend));
    }

    Ok(TemperatureAt {
        frame: parse_frame(frame)?,
        level,
        trend,
    })
}

fn parse_frame(s: &str) -> Result<u64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid frame number '{}'", s))
}
