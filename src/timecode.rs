//! Chapter timecodes
//!
//! Chapter boundaries arrive as text (`HH:MM:SS[.fff]`, optionally with a
//! leading `d.` day part or without the seconds). They are parsed once, at
//! resolution time, into exact [`Timecode`] values; all arithmetic stays in
//! integer nanoseconds so accumulated chapter positions never drift.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::TimecodeError;

const SECS_PER_DAY: u64 = 86_400;

fn timecode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(\d+)\.)?(\d+):(\d{1,2})(?::(\d{1,2})(?:\.(\d{1,7}))?)?$")
            .expect("timecode pattern is valid")
    })
}

/// A point on a source recording's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timecode(Duration);

impl Timecode {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

/// Whole milliseconds of a duration, truncated rather than rounded
pub fn truncate_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let input = value.trim();
        let caps = timecode_pattern()
            .captures(input)
            .ok_or_else(|| TimecodeError::Malformed(value.to_string()))?;

        let out_of_range = || TimecodeError::OutOfRange(value.to_string());
        let number = |idx: usize| -> Result<u64, TimecodeError> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| out_of_range()))
                .unwrap_or(Ok(0))
        };

        let days = number(1)?;
        let hours = number(2)?;
        let minutes = number(3)?;
        let seconds = number(4)?;

        if minutes >= 60 || seconds >= 60 || (caps.get(1).is_some() && hours >= 24) {
            return Err(out_of_range());
        }

        // Up to 7 fractional digits (100ns ticks), right-padded to nanoseconds
        let nanos = match caps.get(5) {
            Some(m) => {
                let digits = m.as_str();
                let scale = 10u32.pow(9 - digits.len() as u32);
                digits.parse::<u32>().map_err(|_| out_of_range())? * scale
            }
            None => 0,
        };

        let total_secs = days
            .checked_mul(SECS_PER_DAY)
            .and_then(|d| hours.checked_mul(3_600).and_then(|h| d.checked_add(h)))
            .and_then(|s| s.checked_add(minutes * 60 + seconds))
            .ok_or_else(out_of_range)?;

        Ok(Self(Duration::new(total_secs, nanos)))
    }
}

impl fmt::Display for Timecode {
    /// Renders `HH:MM:SS[.fraction]`, the form the transcoder accepts
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        let (hours, minutes, seconds) = (total / 3_600, (total / 60) % 60, total % 60);
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")?;

        let nanos = self.0.subsec_nanos();
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            write!(f, ".{}", fraction.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

/// Validated `[start, stop)` range of a chapter within its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterSpan {
    pub start: Timecode,
    pub stop: Timecode,
}

impl ChapterSpan {
    /// Parse both boundaries; the span must have a positive duration
    pub fn parse(start: &str, stop: &str) -> Result<Self, TimecodeError> {
        let start_tc: Timecode = start.parse()?;
        let stop_tc: Timecode = stop.parse()?;
        if stop_tc <= start_tc {
            return Err(TimecodeError::NonPositiveDuration {
                start: start.trim().to_string(),
                stop: stop.trim().to_string(),
            });
        }
        Ok(Self {
            start: start_tc,
            stop: stop_tc,
        })
    }

    pub fn duration(&self) -> Duration {
        self.stop.as_duration() - self.start.as_duration()
    }
}
