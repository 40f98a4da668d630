//! Circular time-of-day arithmetic.
//!
//! All times are fractional hours in [0, 24). Trips recur daily, so every
//! comparison here wraps around midnight: differences are taken the short
//! way around the 24-hour cycle and ordering is defined on a half-day
//! window rather than the number line.

use crate::error::{CommuteFlowError, Result};

/// Parse a "HH:MM:SS" wall-clock string into fractional hours.
///
/// # Example
/// ```
/// use commutematch::time_utils::time_to_hour;
/// let hour = time_to_hour("08:20:00").unwrap();
/// assert!((hour - 8.333333).abs() < 1e-5);
/// ```
pub fn time_to_hour(time: &str) -> Result<f64> {
    let malformed = || CommuteFlowError::MalformedTime {
        value: time.to_string(),
    };

    let mut parts = time.split(':');
    let hh: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let mm: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let ss: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;

    if parts.next().is_some() || hh >= 24 || mm >= 60 || ss >= 60 {
        return Err(malformed());
    }

    Ok(hh as f64 + mm as f64 / 60.0 + ss as f64 / 3600.0)
}

/// Format fractional hours as a "HH:MM:SS" wall-clock string.
///
/// Negative hours (produced by midnight-wrap averaging) are shifted back
/// into the current day before formatting.
pub fn hour_to_time(hour: f64) -> String {
    let mut hour = hour;
    if hour < 0.0 {
        hour += 24.0;
    }

    let total_seconds = (hour * 3600.0).round() as i64;
    let hh = total_seconds / 3600;
    let mm = (total_seconds % 3600) / 60;
    let ss = total_seconds % 60;
    format!("{hh:02}:{mm:02}:{ss:02}")
}

/// Shortest circular difference between two hours-of-day.
///
/// The difference is either the direct distance or the distance the other
/// way around the 24-hour cycle, whichever is smaller. Always in [0, 12].
pub fn hour_gap(t1: f64, t2: f64) -> f64 {
    let direct = (t1 - t2).abs();
    direct.min(24.0 - direct)
}

/// Circular ordering test: does `t1` lie within the half-day window
/// starting at `t2`?
///
/// Equivalent to `(t1 - t2).rem_euclid(24.0) < 12.0`, written as the two
/// explicit branches so the wrap case stays visible.
pub fn within_half_day_after(t1: f64, t2: f64) -> bool {
    let diff = t1 - t2;
    (0.0..12.0).contains(&diff) || diff < -12.0
}
