//! Query Session - the active filter state over an `EventIndex`
//!
//! A session holds one predicate per dimension. Predicates are independent
//! and their effects intersect: a record is returned only if every dimension
//! accepts it.
//!
//! Predicates persist between reads until they are replaced or cleared.
//! Every statistics query therefore starts with `apply_date_filters`, and
//! any kind predicate it sets stays in place after the query returns.
//!
//! ```text
//! apply_date_filters(window, active_days)
//!        ↓
//! by_kind(Cbg) → records(&index) → [cbg events in window, active weekdays only]
//! ```

use crate::events::{ActiveDays, Event, EventKind, TimeRange};
use crate::index::{EventIndex, Predicate};

/// Per-dimension predicates plus the effective day count of the last window
#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    date: Predicate<i64>,
    weekday: Predicate<u8>,
    kind: Predicate<EventKind>,
    effective_days: f64,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Dimension Filters ====================

    /// Restrict the by-date dimension to `[range.start, range.end)`
    pub fn by_date_range(&mut self, range: TimeRange) -> &mut Self {
        self.date = Predicate::Range {
            start: range.start,
            end: range.end,
        };
        self
    }

    /// Restrict the by-weekday dimension; an empty set accepts every day
    pub fn by_weekday_set(&mut self, days: &ActiveDays) -> &mut Self {
        self.weekday = if days.is_empty() {
            Predicate::All
        } else {
            Predicate::AnyOf(days.as_set().clone())
        };
        self
    }

    /// Restrict the by-kind dimension to one kind
    pub fn by_kind(&mut self, kind: EventKind) -> &mut Self {
        self.kind = Predicate::Exact(kind);
        self
    }

    pub fn clear_date_range(&mut self) -> &mut Self {
        self.date = Predicate::All;
        self
    }

    pub fn clear_weekdays(&mut self) -> &mut Self {
        self.weekday = Predicate::All;
        self
    }

    pub fn clear_kind(&mut self) -> &mut Self {
        self.kind = Predicate::All;
        self
    }

    /// Reset every dimension to accept all records
    pub fn clear_all(&mut self) -> &mut Self {
        self.clear_date_range().clear_weekdays().clear_kind()
    }

    // ==================== Filter Pipeline ====================

    /// Apply the window and weekday restriction, returning the effective day count
    ///
    /// `effective_days = window_days × |active_days| / 7` when only some
    /// weekdays are active, otherwise the raw window length in days.
    pub fn apply_date_filters(&mut self, window: TimeRange, active_days: &ActiveDays) -> f64 {
        self.by_date_range(window);
        self.clear_weekdays();
        if !active_days.is_empty() {
            self.by_weekday_set(active_days);
        }

        self.effective_days = window.days() * active_days.week_fraction();

        tracing::debug!(
            start = window.start,
            end = window.end,
            active_days = active_days.len(),
            effective_days = self.effective_days,
            "Applied date filters"
        );

        self.effective_days
    }

    /// Day count computed by the last `apply_date_filters`
    pub fn effective_days(&self) -> f64 {
        self.effective_days
    }

    // ==================== Reads ====================

    /// Events accepted by every dimension, ascending by `normalTime`
    pub fn records<'a>(&self, index: &'a EventIndex) -> Vec<&'a Event> {
        index.select(self)
    }

    pub fn date_predicate(&self) -> &Predicate<i64> {
        &self.date
    }

    pub fn weekday_predicate(&self) -> &Predicate<u8> {
        &self.weekday
    }

    pub fn kind_predicate(&self) -> &Predicate<EventKind> {
        &self.kind
    }
}
