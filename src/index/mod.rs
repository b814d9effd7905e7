//! Glycostat Index Structures
//!
//! A crossfilter-style index over the event collection:
//!
//! - **Dimension**: ordered key → records projection (date, weekday, kind)
//! - **EventIndex**: owns the events and keeps the three dimensions consistent
//! - **QuerySession**: the active predicates, applied on each read
//!
//! # Architecture
//!
//! ```text
//! Query: "cbg readings on weekends in the last 14 days"
//!        ↓
//! by-date:    Range [start, end)     → ids in time order
//!        ↓
//! by-weekday: AnyOf {Sat, Sun}       → drop weekday ids
//!        ↓
//! by-kind:    Exact(cbg)             → drop non-cbg ids
//!        ↓
//! Resolve ids → &Event
//! ```

mod dimension;
mod manager;
mod session;

pub use dimension::{Dimension, Predicate};
pub use manager::EventIndex;
pub use session::QuerySession;

use crate::events::EventKind;
use serde::Serialize;

/// Statistics about index contents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of indexed events
    pub total_events: usize,
    /// Event count per kind, in kind order
    pub events_by_kind: Vec<(EventKind, usize)>,
    /// Number of distinct local weekdays with at least one event
    pub weekdays_covered: usize,
    /// Earliest and latest `normalTime`
    pub time_bounds: Option<(i64, i64)>,
}
