use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::model::attendance::AttendanceStatus;

/// Check-ins strictly after this time are late.
pub const DEFAULT_LATE_CUTOFF: ClockTime = ClockTime { minutes: 9 * 60 + 30 };

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ClockError {
    #[display(fmt = "'{}' is not a HH:MM time", _0)]
    Malformed(String),
    #[display(fmt = "'{}' is outside 00:00-23:59", _0)]
    OutOfRange(String),
    #[display(fmt = "check-out {} is before check-in {}", check_out, check_in)]
    CheckOutBeforeCheckIn {
        check_in: ClockTime,
        check_out: ClockTime,
    },
}

impl std::error::Error for ClockError {}

/// Time of day with minute precision, written `HH:MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ClockError> {
        if hour > 23 || minute > 59 {
            return Err(ClockError::OutOfRange(format!("{hour}:{minute:02}")));
        }
        Ok(Self {
            minutes: hour as u16 * 60 + minute as u16,
        })
    }

    pub fn hour(self) -> u8 {
        (self.minutes / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.minutes % 60) as u8
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.minutes
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour() as u32, self.minute() as u32, 0).unwrap_or_default()
    }
}

impl From<NaiveTime> for ClockTime {
    /// Seconds are dropped.
    fn from(t: NaiveTime) -> Self {
        Self {
            minutes: (t.hour() * 60 + t.minute()) as u16,
        }
    }
}

impl FromStr for ClockTime {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let malformed = || ClockError::Malformed(raw.to_string());

        let (h, m) = raw.split_once(':').ok_or_else(malformed)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(h) || !digits(m) || h.len() > 2 || m.len() != 2 {
            return Err(malformed());
        }

        let hour: u8 = h.parse().map_err(|_| malformed())?;
        let minute: u8 = m.parse().map_err(|_| malformed())?;
        ClockTime::new(hour, minute).map_err(|_| ClockError::OutOfRange(raw.to_string()))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Worked duration, rendered `H:MM`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkedTime {
    minutes: u32,
}

impl WorkedTime {
    pub fn from_minutes(minutes: u32) -> Self {
        Self { minutes }
    }

    pub fn minutes(self) -> u32 {
        self.minutes
    }

    pub fn hours_part(self) -> u32 {
        self.minutes / 60
    }

    pub fn minutes_part(self) -> u32 {
        self.minutes % 60
    }

    /// True fractional hours, e.g. 4:30 is 4.5.
    pub fn as_hours(self) -> f64 {
        self.minutes as f64 / 60.0
    }
}

impl fmt::Display for WorkedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hours_part(), self.minutes_part())
    }
}

impl Add for WorkedTime {
    type Output = WorkedTime;

    fn add(self, rhs: Self) -> Self::Output {
        WorkedTime::from_minutes(self.minutes + rhs.minutes)
    }
}

impl Sum for WorkedTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(WorkedTime::default(), Add::add)
    }
}

/// `Late` only when the check-in is strictly after `cutoff`.
pub fn compute_status(check_in: ClockTime, cutoff: ClockTime) -> AttendanceStatus {
    if check_in > cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Same-day span between two punches. Overnight spans are refused.
pub fn elapsed(check_in: ClockTime, check_out: ClockTime) -> Result<WorkedTime, ClockError> {
    if check_out < check_in {
        return Err(ClockError::CheckOutBeforeCheckIn {
            check_in,
            check_out,
        });
    }
    Ok(WorkedTime::from_minutes(
        (check_out.minutes_since_midnight() - check_in.minutes_since_midnight()) as u32,
    ))
}
