//! Boundary overlap for duration-bearing events
//!
//! A basal segment programmed before the window can still be delivering
//! when the window opens. The date dimension only sees start times, so such
//! a segment is found with a one-day lookback and clipped to the window.
//!
//! ```text
//!            window.start                      window.end
//!                 |------------------------------|
//!    [====segment====)        counts: window.start .. segment end
//!             [=====in window=====)       counts: full duration
//!                               [=====segment=====)   counts: .. window.end
//! ```

use crate::events::{Event, EventKind, TimeRange, ONE_DAY};
use crate::index::{EventIndex, QuerySession};

/// Milliseconds of `[start, start + duration)` that fall inside `window`
pub fn duration_in_range(start: i64, duration: i64, window: &TimeRange) -> i64 {
    let end = start.saturating_add(duration);
    if start >= window.start && end <= window.end {
        return duration.max(0);
    }
    (end.min(window.end) - start.max(window.start)).max(0)
}

/// Clipped duration of an event, 0 for kinds without a duration
pub fn event_duration_in_range(event: &Event, window: &TimeRange) -> i64 {
    event
        .duration()
        .map(|d| duration_in_range(event.timestamp(), d, window))
        .unwrap_or(0)
}

/// Prepend the event of `kind` that started before `window` and runs into it
///
/// Looks at `[window.start - ONE_DAY, window.start)` through the session's
/// current weekday predicate and takes the chronologically last event. The
/// session's date predicate is restored to `window` before returning.
pub fn resolve_overlapping_start<'a>(
    index: &'a EventIndex,
    session: &mut QuerySession,
    window: TimeRange,
    kind: EventKind,
    mut in_window: Vec<&'a Event>,
) -> Vec<&'a Event> {
    session.by_date_range(window.lookback(ONE_DAY)).by_kind(kind);
    let prior = session.records(index).last().copied();
    session.by_date_range(window);

    if let Some(event) = prior {
        let start = event.timestamp();
        let end = start.saturating_add(event.duration().unwrap_or(0));
        if start < window.start && window.start < end {
            tracing::debug!(
                kind = %kind,
                start,
                overlap_ms = end.min(window.end) - window.start,
                "Including event that started before the window"
            );
            in_window.insert(0, event);
        }
    }

    in_window
}
