//! Frame index to wall-clock timestamp conversion.
//!
//! Timestamps are rounded to the nearest whole millisecond (half away from zero)
//! once, and both the numeric and the formatted representation are derived from
//! that rounded value, so `seconds()` and `formatted()` always agree.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TimelineError};

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;

/// A position in the video, held as whole milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    millis: u64,
}

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Timestamp of `frame_index` at `fps` frames per second.
    pub fn from_frame(frame_index: u64, fps: f64) -> Result<Self> {
        validate_fps(fps)?;
        let millis = (frame_index as f64 * MILLIS_PER_SECOND as f64 / fps).round();
        Ok(Self {
            millis: millis as u64,
        })
    }

    /// Timestamp of an arbitrary non-negative number of seconds.
    pub fn from_seconds(seconds: f64) -> Self {
        let millis = if seconds.is_finite() && seconds > 0.0 {
            (seconds * MILLIS_PER_SECOND as f64).round() as u64
        } else {
            0
        };
        Self { millis }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn seconds(&self) -> f64 {
        self.millis as f64 / MILLIS_PER_SECOND as f64
    }

    /// `HH:MM:SS.mmm`, hours unbounded.
    pub fn formatted(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.millis / MILLIS_PER_HOUR;
        let minutes = (self.millis % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
        let seconds = (self.millis % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
        let millis = self.millis % MILLIS_PER_SECOND;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Formats `frame_index` at `fps` into `(seconds, "HH:MM:SS.mmm")`.
pub fn format_frame(frame_index: u64, fps: f64) -> Result<(f64, String)> {
    let ts = Timestamp::from_frame(frame_index, fps)?;
    Ok((ts.seconds(), ts.formatted()))
}

pub(crate) fn validate_fps(fps: f64) -> Result<()> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(TimelineError::InvalidFps(fps));
    }
    Ok(())
}

/// Parses `HH:MM:SS.mmm`, `MM:SS(.mmm)` or `SS(.mmm)` into seconds.
///
/// Returns `None` for anything else, including minute or second fields of 60 or
/// more when a larger unit is present.
pub fn parse_timestamp(input: &str) -> Option<f64> {
    static TIMESTAMP_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIMESTAMP_RE.get_or_init(|| {
        Regex::new(r"^(?:(?:(\d+):)?(\d{1,2}):)?(\d+)(?:\.(\d{1,3}))?$")
            .expect("timestamp pattern is valid")
    });
    let caps = re.captures(input.trim())?;

    let field = |idx: usize| -> Option<u64> { caps.get(idx).and_then(|m| m.as_str().parse().ok()) };
    let hours = field(1);
    let minutes = field(2);
    let seconds = field(3)?;

    if minutes.is_some() && seconds >= 60 {
        return None;
    }
    if hours.is_some() && minutes.unwrap_or(0) >= 60 {
        return None;
    }

    let fraction = match caps.get(4) {
        Some(m) => {
            let digits = m.as_str();
            let value: u64 = digits.parse().ok()?;
            value * 10u64.pow(3 - digits.len() as u32)
        }
        None => 0,
    };

    // Unbounded digit runs are accepted above, so overflow means "not a time".
    let millis = hours
        .unwrap_or(0)
        .checked_mul(MILLIS_PER_HOUR)?
        .checked_add(minutes.unwrap_or(0).checked_mul(MILLIS_PER_MINUTE)?)?
        .checked_add(seconds.checked_mul(MILLIS_PER_SECOND)?)?
        .checked_add(fraction)?;
    Some(Timestamp::from_millis(millis).seconds())
}
