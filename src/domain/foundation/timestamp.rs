//! Time value objects: instants and usage days.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Out-of-range values clamp to the Unix epoch rather than panic; the
    /// only callers feed provider-supplied integers that have already
    /// passed payload validation.
    pub fn from_unix_secs(secs: i64) -> Self {
        use chrono::TimeZone;
        Self(
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH),
        )
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Negative if `other` is after `self`.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn add_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Returns the UTC calendar day this instant falls on.
    pub fn day(&self) -> UsageDay {
        UsageDay(self.0.date_naive())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A UTC calendar day, the period key for usage counters.
///
/// Counters are keyed by (user, day); a counter for a day that has not
/// been touched yet is implicitly zero, which is what makes the midnight
/// rollover free of any reset job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageDay(NaiveDate);

impl UsageDay {
    /// The current UTC day.
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    /// Creates a day from calendar components, for fixtures.
    ///
    /// Returns `None` for impossible dates (e.g. February 30th).
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Returns the following calendar day.
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }

    /// Returns the inner NaiveDate.
    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl fmt::Display for UsageDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_roundtrip() {
        let ts = Timestamp::from_unix_secs(1_704_067_200);
        assert_eq!(ts.as_unix_secs(), 1_704_067_200);
    }

    #[test]
    fn ordering_comparisons() {
        let earlier = Timestamp::from_unix_secs(1_000);
        let later = Timestamp::from_unix_secs(2_000);
        assert!(earlier.is_before(&later));
        assert!(later.is_after(&earlier));
        assert_eq!(later.duration_since(&earlier), Duration::seconds(1_000));
    }

    #[test]
    fn add_days_moves_forward() {
        let ts = Timestamp::from_unix_secs(0);
        assert_eq!(ts.add_days(1).as_unix_secs(), 86_400);
    }

    #[test]
    fn day_truncates_to_calendar_date() {
        // 2024-01-01T23:59:59Z and 2024-01-01T00:00:01Z are the same day
        let late = Timestamp::from_unix_secs(1_704_153_599);
        let early = Timestamp::from_unix_secs(1_704_067_201);
        assert_eq!(late.day(), early.day());
    }

    #[test]
    fn next_day_crosses_month_boundary() {
        let day = UsageDay::from_ymd(2024, 1, 31).unwrap();
        assert_eq!(day.next(), UsageDay::from_ymd(2024, 2, 1).unwrap());
    }

    #[test]
    fn usage_day_displays_iso_format() {
        let day = UsageDay::from_ymd(2024, 3, 7).unwrap();
        assert_eq!(day.to_string(), "2024-03-07");
    }

    #[test]
    fn impossible_date_is_rejected() {
        assert!(UsageDay::from_ymd(2024, 2, 30).is_none());
    }
}
