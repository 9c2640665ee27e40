use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::CalendarError;

pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
pub const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

/// An absolute point in time: Unix epoch milliseconds, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(i64);

impl Instant {
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub fn millis(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(self) -> Result<DateTime<Utc>, CalendarError> {
        DateTime::from_timestamp_millis(self.0).ok_or_else(|| {
            CalendarError::invalid_input(format!("epoch value out of range: {}", self.0))
        })
    }

    /// Truncates to midnight UTC of the same calendar day.
    #[must_use]
    pub fn start_of_day(self) -> Self {
        Self(self.0.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY)
    }

    /// ISO weekday of the UTC calendar day: 1 = Monday .. 7 = Sunday.
    #[must_use]
    pub fn iso_weekday(self) -> i64 {
        // Day 0 of the epoch was a Thursday.
        let day = self.0.div_euclid(MILLIS_PER_DAY);
        (day + 3).rem_euclid(7) + 1
    }

    /// Weekday in the 0 = Sunday .. 6 = Saturday convention.
    #[must_use]
    pub fn weekday_sun0(self) -> i64 {
        let day = self.0.div_euclid(MILLIS_PER_DAY);
        (day + 4).rem_euclid(7)
    }

    #[must_use]
    pub fn to_calendar_date(self) -> CalendarDate {
        let day = self.0.div_euclid(MILLIS_PER_DAY);
        let date = chrono::Duration::try_days(day)
            .and_then(|delta| NaiveDate::default().checked_add_signed(delta))
            .unwrap_or(if day < 0 { NaiveDate::MIN } else { NaiveDate::MAX });
        CalendarDate(date)
    }
}

/// A date-only value with no time-of-day attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Midnight UTC on this date.
    #[must_use]
    pub fn to_instant(self) -> Instant {
        let days = self.0.signed_duration_since(NaiveDate::default()).num_days();
        Instant::from_millis(days * MILLIS_PER_DAY)
    }

    #[must_use]
    pub fn naive(self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Parses an ISO 8601 string into epoch milliseconds.
///
/// Accepts RFC 3339 datetimes and bare `YYYY-MM-DD` dates; bare dates
/// are read as midnight UTC.
pub fn iso_to_unix(raw: &str) -> Result<Instant, CalendarError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(CalendarError::invalid_input("empty date string"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(Instant::from_datetime(dt.with_timezone(&Utc)));
    }

    let date_re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").map_err(|e| {
        CalendarError::invalid_input(format!("internal regex compile failure: {e}"))
    })?;
    if date_re.is_match(token) {
        let date = NaiveDate::parse_from_str(token, "%Y-%m-%d").map_err(|e| {
            CalendarError::invalid_input(format!("invalid calendar date '{token}': {e}"))
        })?;
        return Ok(CalendarDate::new(date).to_instant());
    }

    Err(CalendarError::invalid_input(format!(
        "unrecognized date string '{token}': expected RFC 3339 or YYYY-MM-DD"
    )))
}

/// Renders epoch milliseconds as an RFC 3339 UTC string.
pub fn unix_to_iso(millis: i64) -> Result<String, CalendarError> {
    let instant = Instant::from_millis(millis);
    Ok(instant
        .to_datetime()?
        .to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Formats an instant as a date in the given timezone (for display only;
/// all arithmetic stays in UTC millis).
pub fn format_zoned_date(instant: Instant, tz: &Tz) -> Result<String, CalendarError> {
    let dt = instant.to_datetime()?;
    Ok(dt.with_timezone(tz).format("%a %Y-%m-%d").to_string())
}

/// Serde adapter for instants carried as ISO 8601 strings in JSON, the
/// shape events arrive in.
pub mod iso_date_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Instant, iso_to_unix, unix_to_iso};

    pub fn serialize<S>(instant: &Instant, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rendered = unix_to_iso(instant.millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Instant, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        iso_to_unix(&raw).map_err(serde::de::Error::custom)
    }
}
