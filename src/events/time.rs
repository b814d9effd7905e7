//! Temporal primitives shared by the index and the statistics engine
//!
//! - `TimeRange`: the half-open query window `[start, end)`
//! - `ActiveDays`: the weekday restriction applied on top of the window
//! - Millisecond duration constants and the timezone-aware weekday extractor

use crate::events::error::{EventError, EventResult};
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

pub const ONE_MINUTE: i64 = 60 * 1000;
pub const ONE_HOUR: i64 = 60 * ONE_MINUTE;
pub const ONE_DAY: i64 = 24 * ONE_HOUR;

/// Weekday index (0 = Sunday .. 6 = Saturday) of an instant, in the given timezone
///
/// Day of week is a local-time concept, so the instant is shifted into `tz`
/// before the day is read.
pub fn weekday_index(timestamp: i64, tz: &Tz) -> u8 {
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(utc) => utc.with_timezone(tz).weekday().num_days_from_sunday() as u8,
        None => 0,
    }
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range
    ///
    /// # Panics
    /// Panics if start >= end
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start < end, "TimeRange: start must be less than end");
        Self { start, end }
    }

    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Create a range from two UTC instants
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> EventResult<Self> {
        Self::try_new(start.timestamp_millis(), end.timestamp_millis())
            .ok_or(EventError::InvalidTimeRange)
    }

    /// Create a range covering `days` whole local days starting at local
    /// midnight of `date` in `tz`
    pub fn local_days(date: NaiveDate, days: u32, tz: &Tz) -> EventResult<Self> {
        let local_midnight = |d: NaiveDate| {
            d.and_hms_opt(0, 0, 0)
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
                .ok_or_else(|| EventError::InvalidDate(format!("{} in {}", d, tz.name())))
        };

        let end_date = date
            .checked_add_days(Days::new(days as u64))
            .ok_or_else(|| EventError::InvalidDate(format!("{} + {} days", date, days)))?;

        let start = local_midnight(date)?.timestamp_millis();
        let end = local_midnight(end_date)?.timestamp_millis();
        Self::try_new(start, end).ok_or(EventError::InvalidTimeRange)
    }

    /// Create a range for a specific UTC day
    pub fn day(year: i32, month: u32, day: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
        let end = start + chrono::Duration::days(1);
        Some(Self {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
        })
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Get the duration in milliseconds
    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }

    /// Window length in (fractional) days
    pub fn days(&self) -> f64 {
        self.duration_millis() as f64 / ONE_DAY as f64
    }

    /// The range of `millis` immediately before this one: `[start - millis, start)`
    pub fn lookback(&self, millis: i64) -> Self {
        Self {
            start: self.start - millis,
            end: self.start,
        }
    }

    /// Get intersection with another range, if any
    pub fn intersection(&self, other: &TimeRange) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Self::try_new(start, end)
    }
}

/// Weekdays (0 = Sunday .. 6 = Saturday) whose events are considered
///
/// An empty set means every day is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct ActiveDays(BTreeSet<u8>);

impl ActiveDays {
    /// No restriction
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from weekday indices, rejecting anything outside 0..=6
    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> EventResult<Self> {
        let mut days = BTreeSet::new();
        for idx in indices {
            if idx > 6 {
                return Err(EventError::InvalidWeekday(idx));
            }
            days.insert(idx);
        }
        Ok(Self(days))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, weekday: u8) -> bool {
        self.0.contains(&weekday)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    /// True when only a proper subset of the week is active
    pub fn is_restricted(&self) -> bool {
        !self.0.is_empty() && self.0.len() < 7
    }

    /// Share of the week that is active (1.0 when unrestricted)
    pub fn week_fraction(&self) -> f64 {
        if self.is_restricted() {
            self.0.len() as f64 / 7.0
        } else {
            1.0
        }
    }

    /// Set form used by the weekday dimension predicate
    pub fn as_set(&self) -> &BTreeSet<u8> {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for ActiveDays {
    type Error = EventError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_indices(value)
    }
}

impl From<ActiveDays> for Vec<u8> {
    fn from(days: ActiveDays) -> Self {
        days.0.into_iter().collect()
    }
}

/// Parses a comma-separated list such as `"mon,tue,sat"` or `"1,2,6"`
impl FromStr for ActiveDays {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut days = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let idx = match part.parse::<u8>() {
                Ok(idx) => idx,
                Err(_) => part
                    .parse::<Weekday>()
                    .map(|w| w.num_days_from_sunday() as u8)
                    .map_err(|_| EventError::InvalidDate(format!("unknown weekday '{}'", part)))?,
            };
            if idx > 6 {
                return Err(EventError::InvalidWeekday(idx));
            }
            days.insert(idx);
        }
        Ok(Self(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(1000, 2000);

        assert!(!range.contains(999));
        assert!(range.contains(1000));
        assert!(range.contains(1999));
        assert!(!range.contains(2000));
    }

    #[test]
    fn test_time_range_overlaps() {
        let range1 = TimeRange::new(1000, 2000);
        let range2 = TimeRange::new(1500, 2500);
        let range3 = TimeRange::new(2000, 3000);

        assert!(range1.overlaps(&range2));
        assert!(!range1.overlaps(&range3)); // Adjacent, not overlapping
    }

    #[test]
    fn test_time_range_days_and_lookback() {
        let range = TimeRange::day(2018, 2, 1).unwrap();
        assert_eq!(range.duration_millis(), ONE_DAY);
        assert_eq!(range.days(), 1.0);

        let previous = range.lookback(ONE_DAY);
        assert_eq!(previous, TimeRange::day(2018, 1, 31).unwrap());
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(TimeRange::try_new(2000, 1000).is_none());
        assert!(TimeRange::try_new(1000, 1000).is_none());

        let a = TimeRange::new(0, 10);
        let b = TimeRange::new(10, 20);
        assert!(a.intersection(&b).is_none());
        assert_eq!(
            a.intersection(&TimeRange::new(5, 20)),
            Some(TimeRange::new(5, 10))
        );
    }

    #[test]
    fn test_local_days_uses_timezone_midnight() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2018, 2, 1).unwrap();
        let range = TimeRange::local_days(date, 1, &tz).unwrap();

        // EST is UTC-5 in February
        let expected_start = Utc.with_ymd_and_hms(2018, 2, 1, 5, 0, 0).unwrap();
        assert_eq!(range.start, expected_start.timestamp_millis());
        assert_eq!(range.duration_millis(), ONE_DAY);
    }

    #[test]
    fn test_weekday_index_respects_timezone() {
        // Thursday 2018-02-01 03:00 UTC is still Wednesday evening in New York
        let ts = Utc
            .with_ymd_and_hms(2018, 2, 1, 3, 0, 0)
            .unwrap()
            .timestamp_millis();

        assert_eq!(weekday_index(ts, &Tz::UTC), 4);
        assert_eq!(weekday_index(ts, &"America/New_York".parse().unwrap()), 3);
    }

    #[test]
    fn test_active_days() {
        assert!(!ActiveDays::all().is_restricted());
        assert_eq!(ActiveDays::all().week_fraction(), 1.0);

        let weekdays = ActiveDays::from_indices([1, 2, 3, 4, 5]).unwrap();
        assert!(weekdays.is_restricted());
        assert!((weekdays.week_fraction() - 5.0 / 7.0).abs() < 1e-12);

        let everyday = ActiveDays::from_indices(0..7).unwrap();
        assert!(!everyday.is_restricted());

        assert!(matches!(
            ActiveDays::from_indices([7]),
            Err(EventError::InvalidWeekday(7))
        ));
    }

    #[test]
    fn test_active_days_parsing() {
        let days: ActiveDays = "sun, mon,6".parse().unwrap();
        assert_eq!(days.iter().collect::<Vec<_>>(), vec![0, 1, 6]);

        assert!("funday".parse::<ActiveDays>().is_err());
        assert!("8".parse::<ActiveDays>().is_err());

        let json = serde_json::to_string(&days).unwrap();
        assert_eq!(json, "[0,1,6]");
        assert!(serde_json::from_str::<ActiveDays>("[9]").is_err());
    }
}
