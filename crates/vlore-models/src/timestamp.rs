//! Timestamp formatting for external forms.
//!
//! Offsets within a video are floating seconds internally and `MM:SS`
//! strings on the wire. `HH:MM:SS` is accepted on input for long videos.

use thiserror::Error;

/// Format a second offset as `MM:SS`.
///
/// Minutes are not wrapped at the hour: `3661.0` renders as `61:01`,
/// keeping the form sortable for short-form content.
///
/// # Examples
/// ```
/// use vlore_models::timestamp::format_mmss;
/// assert_eq!(format_mmss(0.0), "00:00");
/// assert_eq!(format_mmss(90.4), "01:30");
/// ```
pub fn format_mmss(total_secs: f64) -> String {
    let total = total_secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Parse a `MM:SS` or `HH:MM:SS` string to total seconds.
///
/// # Examples
/// ```
/// use vlore_models::timestamp::parse_mmss;
/// assert_eq!(parse_mmss("05:30").unwrap(), 330.0);
/// assert_eq!(parse_mmss("01:00:05").unwrap(), 3605.0);
/// ```
pub fn parse_mmss(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let parse_part = |label: &'static str, part: &str| -> Result<f64, TimestampError> {
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(label, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        Ok(value)
    };

    match parts.len() {
        2 => {
            let minutes = parse_part("minutes", parts[0])?;
            let seconds = parse_part("seconds", parts[1])?;
            Ok(minutes * 60.0 + seconds)
        }
        3 => {
            let hours = parse_part("hours", parts[0])?;
            let minutes = parse_part("minutes", parts[1])?;
            let seconds = parse_part("seconds", parts[2])?;
            Ok(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        _ => Err(TimestampError::InvalidFormat(ts.to_string())),
    }
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("timestamp cannot be empty")]
    Empty,
    #[error("timestamp cannot be negative")]
    Negative,
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
    #[error("invalid timestamp format '{0}', expected MM:SS or HH:MM:SS")]
    InvalidFormat(String),
}
