//! Time-of-day and commute direction types.
//!
//! Commute preferences are declared as wall-clock `HH:MM` strings; internally every
//! comparison is done on minutes since midnight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Minutes in one day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time with minute resolution, stored as minutes since midnight.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    /// Create a time from minutes since midnight.
    ///
    /// # Errors
    ///
    /// Returns an error if `minutes` is not below 24 * 60.
    pub const fn from_minutes(minutes: u16) -> Result<Self, TimeError> {
        if minutes < MINUTES_PER_DAY {
            Ok(Self(minutes))
        } else {
            Err(TimeError::OutOfRange(minutes))
        }
    }

    /// Create a time from an hour and minute pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the hour is above 23 or the minute above 59.
    pub const fn from_hm(hour: u16, minute: u16) -> Result<Self, TimeError> {
        if hour > 23 || minute > 59 {
            return Err(TimeError::OutOfRange(hour.saturating_mul(60).saturating_add(minute)));
        }
        Ok(Self(hour * 60 + minute))
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Absolute distance to another time, in minutes, without wrapping at midnight.
    #[must_use]
    pub const fn distance(self, other: Self) -> u16 {
        self.0.abs_diff(other.0)
    }

    /// Whether `other` lies within `tolerance` minutes of this time (inclusive).
    #[must_use]
    pub const fn within(self, other: Self, tolerance: u16) -> bool {
        self.distance(other) <= tolerance
    }

    /// Integer-floor average of a set of times, or `None` for an empty set.
    #[must_use]
    pub fn floor_average(times: &[Self]) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        let total: u32 = times.iter().map(|t| u32::from(t.0)).sum();
        let count = u32::try_from(times.len()).ok()?;
        // The average of values below MINUTES_PER_DAY is itself below it.
        u16::try_from(total / count).ok().map(Self)
    }
}

impl From<chrono::NaiveTime> for MinuteOfDay {
    fn from(time: chrono::NaiveTime) -> Self {
        use chrono::Timelike;
        // hour() <= 23 and minute() <= 59, so this always fits.
        #[allow(clippy::cast_possible_truncation)]
        let minutes = (time.hour() * 60 + time.minute()) as u16;
        Self(minutes)
    }
}

impl FromStr for MinuteOfDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| TimeError::Malformed(s.to_string()))?;
        let hour: u16 = h.parse().map_err(|_| TimeError::Malformed(s.to_string()))?;
        let minute: u16 = m.parse().map_err(|_| TimeError::Malformed(s.to_string()))?;
        Self::from_hm(hour, minute)
    }
}

impl fmt::Debug for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinuteOfDay({self})")
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for MinuteOfDay {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MinuteOfDay> for String {
    fn from(time: MinuteOfDay) -> Self {
        time.to_string()
    }
}

/// Which leg of a commute a preference describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Direction {
    /// Travelling to campus.
    Arrival = 1,
    /// Leaving campus.
    Departure = 2,
}

impl Direction {
    /// Convert the direction to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `Direction`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Arrival),
            2 => Some(Self::Departure),
            _ => None,
        }
    }

    /// The wire name of this direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Departure => "departure",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" => Ok(Self::Arrival),
            "departure" => Ok(Self::Departure),
            _ => Err(TimeError::UnknownDirection(s.to_string())),
        }
    }
}

/// Errors that can occur when parsing times and directions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// The input is not of the form `HH:MM`.
    #[error("malformed time, expected HH:MM: {0}")]
    Malformed(String),

    /// The time does not fit in a single day.
    #[error("time out of range: {0} minutes")]
    OutOfRange(u16),

    /// The direction is neither `arrival` nor `departure`.
    #[error("unknown commute direction: {0}")]
    UnknownDirection(String),
}
