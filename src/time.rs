//! Time-of-day helpers shared by the layout engine and the appointment source

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Minutes in a full day; also the largest valid time of day (`24:00`).
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Duration assumed when neither an end time nor a service duration is known.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Parses a `HH:MM` string (optionally `HH:MM:SS`) into minutes since midnight.
///
/// `24:00` is accepted so that appointments can end exactly at midnight.
pub fn time_to_minutes(time: &str) -> Result<u32> {
    let invalid = || Error::InvalidTime(time.to_string());

    let mut parts = time.trim().split(':');
    let hours = parts.next().ok_or_else(invalid)?;
    let minutes = parts.next().ok_or_else(invalid)?;
    // Seconds from SQL `time` columns are tolerated and dropped
    if let Some(seconds) = parts.next() {
        if !all_digits(seconds) {
            return Err(invalid());
        }
        seconds.parse::<u32>().ok().filter(|s| *s < 60).ok_or_else(invalid)?;
    }
    if parts.next().is_some() || hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    if !all_digits(hours) || !all_digits(minutes) {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

fn all_digits(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Formats minutes since midnight as zero-padded `HH:MM`, wrapping at 24h.
pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

/// Resolves the end of an appointment in minutes since midnight.
///
/// An explicit end wins, then `start + duration`, then `start + 30`.
/// An explicit end that is not after the start and a non-positive duration
/// are both treated as unknown, so the result is always after `start`.
pub fn derive_end_minutes(start: u32, explicit_end: Option<u32>, duration_minutes: Option<i64>) -> u32 {
    // an end at or before the start would give the block no height
    if let Some(end) = explicit_end.filter(|end| *end > start) {
        return end;
    }
    match duration_minutes {
        Some(d) if d > 0 => start.saturating_add(u32::try_from(d).unwrap_or(u32::MAX)),
        _ => start + DEFAULT_DURATION_MINUTES,
    }
}

/// A validated time of day, stored as minutes since midnight (0..=1440).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        if minutes > MINUTES_PER_DAY {
            return Err(Error::InvalidTime(format!("{} minutes", minutes)));
        }
        Ok(Self(minutes))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        time_to_minutes(s).map(TimeOfDay)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&minutes_to_time(self.0))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&minutes_to_time(self.0))
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
