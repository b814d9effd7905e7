//! Dimension - an ordered projection of the event collection
//!
//! Maps key → record ids (positions in the index's event vector), kept in key
//! order so range and exact lookups are O(log n + k). Each dimension also keeps
//! the key of every record so other dimensions' results can be intersected
//! against it in O(1) per record.
//!
//! # Example
//! ```ignore
//! let by_kind = Dimension::build(events.iter().map(Event::kind));
//! let cbg_ids: Vec<usize> = by_kind.select(&Predicate::Exact(EventKind::Cbg)).collect();
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// Filter applied to a single dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate<K> {
    /// Accept every record
    All,
    /// Accept keys in the half-open interval `[start, end)`
    Range { start: K, end: K },
    /// Accept one key
    Exact(K),
    /// Accept any key in the set
    AnyOf(BTreeSet<K>),
}

impl<K> Default for Predicate<K> {
    fn default() -> Self {
        Predicate::All
    }
}

impl<K: Ord> Predicate<K> {
    /// Check a key against this predicate
    pub fn accepts(&self, key: &K) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Range { start, end } => key >= start && key < end,
            Predicate::Exact(k) => key == k,
            Predicate::AnyOf(keys) => keys.contains(key),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }
}

/// Ordered key → records projection
#[derive(Debug, Clone)]
pub struct Dimension<K> {
    /// Key of each record, indexed by record id
    keys: Vec<K>,
    /// key → record ids in insertion order
    sorted: BTreeMap<K, Vec<usize>>,
}

impl<K: Ord + Copy> Dimension<K> {
    /// Build from one key per record; record ids are the iteration positions
    pub fn build<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let keys: Vec<K> = keys.into_iter().collect();
        let mut sorted: BTreeMap<K, Vec<usize>> = BTreeMap::new();

        for (id, key) in keys.iter().enumerate() {
            sorted.entry(*key).or_default().push(id);
        }

        Self { keys, sorted }
    }

    /// Number of records projected
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key of a record
    ///
    /// # Panics
    /// Panics if `record` is not an id of this dimension
    pub fn key(&self, record: usize) -> K {
        self.keys[record]
    }

    /// Record ids accepted by `predicate`, in ascending key order
    pub fn select<'a>(&'a self, predicate: &'a Predicate<K>) -> Box<dyn Iterator<Item = usize> + 'a> {
        match predicate {
            Predicate::All => Box::new(self.sorted.values().flat_map(|ids| ids.iter().copied())),
            Predicate::Range { start, end } => {
                if start >= end {
                    return Box::new(std::iter::empty());
                }
                Box::new(
                    self.sorted
                        .range(*start..*end)
                        .flat_map(|(_, ids)| ids.iter().copied()),
                )
            }
            Predicate::Exact(key) => Box::new(
                self.sorted
                    .get(key)
                    .into_iter()
                    .flat_map(|ids| ids.iter().copied()),
            ),
            Predicate::AnyOf(keys) => Box::new(
                keys.iter()
                    .filter_map(move |k| self.sorted.get(k))
                    .flat_map(|ids| ids.iter().copied()),
            ),
        }
    }

    /// Number of records per distinct key
    pub fn group_counts(&self) -> Vec<(K, usize)> {
        self.sorted.iter().map(|(k, ids)| (*k, ids.len())).collect()
    }

    /// Smallest and largest key
    pub fn bounds(&self) -> Option<(K, K)> {
        let min = self.sorted.keys().next()?;
        let max = self.sorted.keys().next_back()?;
        Some((*min, *max))
    }
}
