//! Event Index - owns the event collection and its three dimensions
//!
//! - **by-date**: `normalTime` in epoch milliseconds (primary, drives ordering)
//! - **by-weekday**: local weekday 0-6 in the index timezone
//! - **by-kind**: `EventKind`
//!
//! # Query Path
//!
//! ```text
//! Session: date ∈ [Feb 1, Feb 15), weekday ∈ {Sat, Sun}, kind = cbg
//!
//! 1. by-date: walk record ids in [Feb 1, Feb 15) in time order
//! 2. by-weekday: keep ids whose local weekday is Sat or Sun
//! 3. by-kind: keep ids whose kind is cbg
//! 4. Resolve ids to events
//! ```
//!
//! Every mutation rebuilds all three dimensions from the new collection and
//! swaps them in together, so the dimensions always project the same records.

use crate::events::{weekday_index, Event, EventKind};
use crate::index::{Dimension, IndexStats, QuerySession};
use chrono_tz::Tz;

/// Multi-dimensional index over immutable events
#[derive(Debug, Clone)]
pub struct EventIndex {
    events: Vec<Event>,
    by_date: Dimension<i64>,
    by_weekday: Dimension<u8>,
    by_kind: Dimension<EventKind>,
    timezone: Tz,
    /// Bumped on every add/remove
    generation: u64,
}

impl EventIndex {
    /// Index a collection; weekdays are extracted in `timezone`
    pub fn build(events: Vec<Event>, timezone: Tz) -> Self {
        let (by_date, by_weekday, by_kind) = Self::project(&events, &timezone);

        tracing::debug!(
            "Indexed {} events ({} distinct kinds, timezone {})",
            events.len(),
            by_kind.group_counts().len(),
            timezone
        );

        Self {
            events,
            by_date,
            by_weekday,
            by_kind,
            timezone,
            generation: 0,
        }
    }

    fn project(
        events: &[Event],
        timezone: &Tz,
    ) -> (Dimension<i64>, Dimension<u8>, Dimension<EventKind>) {
        let by_date = Dimension::build(events.iter().map(Event::timestamp));
        let by_weekday =
            Dimension::build(events.iter().map(|e| weekday_index(e.timestamp(), timezone)));
        let by_kind = Dimension::build(events.iter().map(Event::kind));
        (by_date, by_weekday, by_kind)
    }

    fn rebuild(&mut self, events: Vec<Event>) {
        let (by_date, by_weekday, by_kind) = Self::project(&events, &self.timezone);
        self.events = events;
        self.by_date = by_date;
        self.by_weekday = by_weekday;
        self.by_kind = by_kind;
        self.generation += 1;
    }

    // ==================== Update Methods ====================

    /// Add events to every dimension, returning how many were added
    pub fn add<I: IntoIterator<Item = Event>>(&mut self, events: I) -> usize {
        let mut combined = self.events.clone();
        let before = combined.len();
        combined.extend(events);
        let added = combined.len() - before;

        if added > 0 {
            self.rebuild(combined);
            tracing::debug!("Added {} events ({} total)", added, self.events.len());
        }
        added
    }

    /// Remove every event matching `predicate`, returning how many were removed
    pub fn remove<F: FnMut(&Event) -> bool>(&mut self, mut predicate: F) -> usize {
        let before = self.events.len();
        let kept: Vec<Event> = self
            .events
            .iter()
            .filter(|e| !predicate(e))
            .cloned()
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.rebuild(kept);
            tracing::debug!("Removed {} events ({} total)", removed, self.events.len());
        }
        removed
    }

    // ==================== Query Methods ====================

    /// Events accepted by every predicate of `session`, ascending by time
    ///
    /// Ties on `normalTime` keep insertion order.
    pub fn select<'a>(&'a self, session: &QuerySession) -> Vec<&'a Event> {
        let weekday = session.weekday_predicate();
        let kind = session.kind_predicate();

        self.by_date
            .select(session.date_predicate())
            .filter(|&id| weekday.accepts(&self.by_weekday.key(id)) && kind.accepts(&self.by_kind.key(id)))
            .map(|id| &self.events[id])
            .collect()
    }

    /// Every event of one kind, ignoring all other filters
    pub fn of_kind(&self, kind: EventKind) -> Vec<&Event> {
        let mut session = QuerySession::new();
        session.by_kind(kind);
        self.select(&session)
    }

    // ==================== Stats Methods ====================

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_events: self.events.len(),
            events_by_kind: self.by_kind.group_counts(),
            weekdays_covered: self.by_weekday.group_counts().len(),
            time_bounds: self.time_bounds(),
        }
    }

    /// Earliest and latest `normalTime` in the index
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        self.by_date.bounds()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
