//! Identifier to payload lists
//!
//! An [`Id2l`] maps page identifiers to handles for the in-memory copies of those pages. A
//! write transaction inserts an entry the first time it modifies a page and looks the page up
//! by identifier on every later access. Entries are never removed individually; the whole map
//! is discarded (or [`clear`](Id2l::clear)ed) when the transaction ends.
//!
//! The map never owns what a payload refers to. Payloads are expected to be cheap handles, such
//! as an index into an arena owned by the transaction.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::idl::IDL_UM_MAX;
use crate::stats;
use crate::Id;

/// Identifier map specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Id2lError {
    /// Supplied maximum capacity too small
    #[error("max: {0} must be >= 1")]
    MaxTooSmall(usize),

    /// Identifier already present
    #[error("identifier: {0} is already present")]
    Duplicate(Id),

    /// Map is at its maximum capacity
    #[error("map is full, max: {0}")]
    Full(usize),

    /// Backing storage could not be allocated
    #[error("could not allocate identifier map storage: {0}")]
    Alloc(#[from] TryReserveError),
}

/// An identifier and its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Id2<P> {
    /// Page identifier
    pub id: Id,
    /// Handle for the page
    pub payload: P,
}

/// A bounded list of identifiers and payloads, in ascending identifier order.
#[derive(Clone, Debug)]
pub struct Id2l<P> {
    entries: Vec<Id2<P>>,
    max: usize,
}

impl<P> Default for Id2l<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            max: IDL_UM_MAX,
        }
    }
}

impl<P> Id2l<P> {
    /// Create an empty map with the default maximum capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map which holds at most `max` entries.
    pub fn with_max(max: usize) -> Result<Self, Id2lError> {
        if max < 1 {
            return Err(Id2lError::MaxTooSmall(max));
        }
        Ok(Self {
            entries: Vec::new(),
            max,
        })
    }

    /// Return the maximum capacity.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Return count of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search for an identifier.
    ///
    /// Returns the position of `id` if present, else the position of the first entry with a
    /// greater identifier.
    pub fn search(&self, id: Id) -> usize {
        self.entries.partition_point(|entry| entry.id < id)
    }

    /// Insert an identifier and payload, keeping the map in order.
    ///
    /// Returns the position of the new entry. Existing entries are never overwritten: inserting
    /// an identifier twice is an error, as is inserting into a full map. On failure the map is
    /// unchanged.
    pub fn insert(&mut self, id: Id, payload: P) -> Result<usize, Id2lError> {
        let pos = self.search(id);

        if self.entries.get(pos).is_some_and(|entry| entry.id == id) {
            stats::record_id2l(|c| c.duplicates += 1);
            return Err(Id2lError::Duplicate(id));
        }

        if self.entries.len() >= self.max {
            stats::record_id2l(|c| c.full += 1);
            return Err(Id2lError::Full(self.max));
        }

        self.entries.try_reserve(1)?;
        self.entries.insert(pos, Id2 { id, payload });
        stats::record_id2l(|c| c.inserts += 1);
        Ok(pos)
    }

    /// Get the payload for an identifier.
    pub fn get(&self, id: Id) -> Option<&P> {
        self.entries
            .get(self.search(id))
            .filter(|entry| entry.id == id)
            .map(|entry| &entry.payload)
    }

    /// Get a mutable reference to the payload for an identifier.
    pub fn get_mut(&mut self, id: Id) -> Option<&mut P> {
        let pos = self.search(id);
        self.entries
            .get_mut(pos)
            .filter(|entry| entry.id == id)
            .map(|entry| &mut entry.payload)
    }

    /// Does the map contain this identifier?
    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    /// Iterate over the entries in ascending identifier order.
    pub fn iter(&self) -> std::slice::Iter<'_, Id2<P>> {
        self.entries.iter()
    }

    /// Remove every entry, keeping the storage for the next transaction.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a, P> IntoIterator for &'a Id2l<P> {
    type Item = &'a Id2<P>;
    type IntoIter = std::slice::Iter<'a, Id2<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::seq::SliceRandom;

    fn ids<P>(map: &Id2l<P>) -> Vec<Id> {
        map.iter().map(|entry| entry.id).collect()
    }

    #[test]
    fn it_searches_empty_map() {
        let map = Id2l::<usize>::new();
        assert_eq!(map.search(7), 0);
        assert!(map.get(7).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn it_inserts_in_ascending_order() {
        let mut map = Id2l::new();
        map.insert(10, "a").expect("inserts");
        map.insert(3, "b").expect("inserts");
        map.insert(7, "c").expect("inserts");
        assert_eq!(
            map.iter().map(|e| (e.id, e.payload)).collect::<Vec<_>>(),
            vec![(3, "b"), (7, "c"), (10, "a")]
        );

        assert_eq!(map.insert(7, "d"), Err(Id2lError::Duplicate(7)));
        assert_eq!(
            map.iter().map(|e| (e.id, e.payload)).collect::<Vec<_>>(),
            vec![(3, "b"), (7, "c"), (10, "a")]
        );
        assert_eq!(map.get(7), Some(&"c"));
    }

    #[test]
    fn it_searches_for_insertion_points() {
        let mut map = Id2l::new();
        for id in [10, 20, 30] {
            map.insert(id, ()).expect("inserts");
        }
        assert_eq!(map.search(5), 0);
        assert_eq!(map.search(10), 0);
        assert_eq!(map.search(15), 1);
        assert_eq!(map.search(20), 1);
        assert_eq!(map.search(30), 2);
        assert_eq!(map.search(31), 3);
    }

    #[test]
    fn it_keeps_random_inserts_ordered() {
        let mut input: Vec<Id> = (0..2_000).map(|i| i * 7).collect();
        input.shuffle(&mut rand::thread_rng());

        // Payloads index an arena the map doesn't own
        let arena: Vec<String> = input.iter().map(|id| format!("page {id}")).collect();
        let mut map = Id2l::new();
        for (idx, id) in input.iter().enumerate() {
            map.insert(*id, idx).expect("inserts");
        }

        assert_eq!(map.len(), input.len());
        assert!(ids(&map).windows(2).all(|w| w[0] < w[1]));
        for id in &input {
            let idx = *map.get(*id).expect("present");
            assert_eq!(arena[idx], format!("page {id}"));
        }
    }

    #[test]
    fn it_rejects_inserts_beyond_max() {
        let mut map = Id2l::with_max(3).expect("valid max");
        for id in [5, 1, 9] {
            map.insert(id, id * 2).expect("inserts");
        }
        assert_eq!(map.insert(4, 8), Err(Id2lError::Full(3)));
        assert_eq!(ids(&map), vec![1, 5, 9]);
        assert_eq!(map.len(), 3);

        // Duplicates are reported ahead of capacity
        assert_eq!(map.insert(5, 0), Err(Id2lError::Duplicate(5)));
        assert_eq!(map.get(5), Some(&10));
    }

    #[test]
    fn it_rejects_zero_max() {
        assert_eq!(
            Id2l::<()>::with_max(0).err(),
            Some(Id2lError::MaxTooSmall(0))
        );
    }

    #[test]
    fn it_updates_payloads_in_place() {
        let mut map = Id2l::new();
        map.insert(42, 1usize).expect("inserts");
        *map.get_mut(42).expect("present") += 1;
        assert_eq!(map.get(42), Some(&2));
        assert!(map.get_mut(41).is_none());
    }

    #[test]
    fn it_clears_for_reuse() {
        let mut map = Id2l::with_max(2).expect("valid max");
        map.insert(1, ()).expect("inserts");
        map.insert(2, ()).expect("inserts");
        map.clear();
        assert!(map.is_empty());
        map.insert(2, ()).expect("inserts after clear");
        assert!(map.contains(2));
        assert!(!map.contains(1));
    }
}
