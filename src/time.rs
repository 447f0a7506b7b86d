//! Candle timestamps
//!
//! History providers hand out calendar dates for daily-and-above bars and epoch
//! seconds for intraday bars. [`CandleTime`] keeps whichever representation the
//! caller used so that markers and signals echo it back unchanged, and exposes a
//! single numeric [`sort_key`](CandleTime::sort_key) for ordering.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::ConfluenceError;

/// Seconds in one day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Time of a candle: calendar date or epoch seconds.
///
/// Serialized untagged, so `1704153600` and `"2024-01-02"` both round-trip as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum CandleTime {
    /// Seconds since the Unix epoch (intraday bars)
    Epoch(i64),
    /// Calendar date (daily, weekly, monthly bars)
    Date(NaiveDate),
}

impl CandleTime {
    /// Comparable epoch seconds. Dates map to 00:00 UTC of that day.
    #[inline]
    pub fn sort_key(self) -> i64 {
        match self {
            CandleTime::Epoch(secs) => secs,
            CandleTime::Date(date) => date.and_time(NaiveTime::MIN).and_utc().timestamp(),
        }
    }

    /// Epoch seconds if this is an intraday timestamp.
    ///
    /// Dates are never intraday. Epoch values below `threshold` are treated as
    /// day-granularity encodings and rejected as well.
    #[inline]
    pub fn intraday_seconds(self, threshold: i64) -> Option<i64> {
        match self {
            CandleTime::Epoch(secs) if secs >= threshold => Some(secs),
            _ => None,
        }
    }

    #[inline]
    pub fn is_date(self) -> bool {
        matches!(self, CandleTime::Date(_))
    }
}

impl From<i64> for CandleTime {
    fn from(secs: i64) -> Self {
        CandleTime::Epoch(secs)
    }
}

impl From<NaiveDate> for CandleTime {
    fn from(date: NaiveDate) -> Self {
        CandleTime::Date(date)
    }
}

impl FromStr for CandleTime {
    type Err = ConfluenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<i64>() {
            return Ok(CandleTime::Epoch(secs));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(CandleTime::Date)
            .map_err(|_| ConfluenceError::InvalidTime(s.to_string()))
    }
}

impl fmt::Display for CandleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleTime::Epoch(secs) => write!(f, "{secs}"),
            CandleTime::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}
