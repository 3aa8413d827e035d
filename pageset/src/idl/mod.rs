//! Identifier Lists
//!
//! An [`Idl`] is a set of page identifiers. The common path is to [`append`](Idl::append)
//! identifiers in whatever order they turn up and [`sort`](Idl::sort) once before the list is
//! used. A sorted list is in strictly descending order, so the highest numbered pages come
//! first.
//!
//! Storage grows a baseline unit at a time and can be [`shrink`](Idl::shrink)ed back to the
//! baseline after a spike.
//!
//! A list may also be in range form. It then only records the lowest and highest identifier it
//! covers and can only answer whether an identifier falls within those bounds. Range form is
//! produced by the ordered [`insert`](Idl::insert) path or by decoding a page image that uses
//! it, and every other operation keeps it intact.

use std::collections::TryReserveError;
use std::ops::RangeInclusive;

use anyhow::Result;
use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats;
use crate::Direction;
use crate::Id;
use crate::BINCODER;

mod sort;

/// log2 of the range form threshold.
pub const IDL_LOGN: u32 = 16;
/// Size of a list which may be stored in a database page image.
pub const IDL_DB_SIZE: usize = 1 << IDL_LOGN;
/// Size of an in-memory list.
pub const IDL_UM_SIZE: usize = 1 << (IDL_LOGN + 1);
/// Element count at which an ordered list collapses into range form.
pub const IDL_DB_MAX: usize = IDL_DB_SIZE - 1;
/// Default baseline capacity of an in-memory list.
pub const IDL_UM_MAX: usize = IDL_UM_SIZE - 1;

/// Count slot value which marks a page image as being in range form.
pub const NOID: Id = Id::MAX;

/// Identifier list specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdlError {
    /// Backing storage could not be allocated
    #[error("could not allocate identifier list storage: {0}")]
    Alloc(#[from] TryReserveError),

    /// Supplied baseline capacity too small
    #[error("baseline: {0} must be >= 1")]
    BaselineTooSmall(usize),

    /// Supplied range threshold too small
    #[error("range threshold: {0} must be >= 2")]
    ThresholdTooSmall(usize),

    /// Identifier already present
    #[error("identifier: {0} is already present")]
    Duplicate(Id),

    /// Operation needs explicit elements
    #[error("list is in range form: {0:?}")]
    RangeForm(IdRange),

    /// Page image could not be decoded
    #[error("malformed page image: {0}")]
    Malformed(String),

    /// Operation needs a strictly descending list
    #[error("list is not strictly descending at position: {0}")]
    Unsorted(usize),
}

/// Sizing of an [`Idl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdlConfig {
    baseline: usize,
    range_threshold: usize,
}

impl Default for IdlConfig {
    fn default() -> Self {
        Self {
            baseline: IDL_UM_MAX,
            range_threshold: IDL_DB_MAX,
        }
    }
}

impl IdlConfig {
    /// Create a configuration with the specified baseline capacity and range threshold.
    ///
    /// The baseline is both the initial capacity and the growth increment.
    pub fn new(baseline: usize, range_threshold: usize) -> Result<Self, IdlError> {
        if baseline < 1 {
            return Err(IdlError::BaselineTooSmall(baseline));
        }
        if range_threshold < 2 {
            return Err(IdlError::ThresholdTooSmall(range_threshold));
        }
        Ok(Self {
            baseline,
            range_threshold,
        })
    }

    /// Baseline capacity.
    pub fn baseline(&self) -> usize {
        self.baseline
    }

    /// Element count at which ordered insert collapses a list into range form.
    pub fn range_threshold(&self) -> usize {
        self.range_threshold
    }

    /// Smallest whole number of baseline units which holds `count` elements.
    fn capacity_for(&self, count: usize) -> usize {
        count.div_ceil(self.baseline).max(1) * self.baseline
    }
}

/// Bounds of a list in range form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    /// Lowest covered identifier
    pub low: Id,
    /// Highest covered identifier
    pub high: Id,
}

impl IdRange {
    /// Does the range cover this identifier?
    pub fn contains(&self, id: Id) -> bool {
        (self.low..=self.high).contains(&id)
    }

    /// Widen the range to cover `id`.
    fn widen(&mut self, id: Id) {
        self.low = self.low.min(id);
        self.high = self.high.max(id);
    }

    /// Number of identifiers covered.
    fn span(&self) -> usize {
        usize::try_from(self.high - self.low)
            .map(|s| s.saturating_add(1))
            .unwrap_or(usize::MAX)
    }
}

impl From<IdRange> for RangeInclusive<Id> {
    fn from(range: IdRange) -> Self {
        range.low..=range.high
    }
}

/// A growable list of identifiers.
#[derive(Clone, Debug)]
pub struct Idl {
    ids: Vec<Id>,
    capacity: usize,
    range: Option<IdRange>,
    config: IdlConfig,
}

impl PartialEq for Idl {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && self.ids == other.ids
    }
}

impl Eq for Idl {}

impl Idl {
    /// Allocate an empty list with the default baseline capacity.
    pub fn new() -> Result<Self, IdlError> {
        Self::with_config(IdlConfig::default())
    }

    /// Allocate an empty list sized by `config`.
    pub fn with_config(config: IdlConfig) -> Result<Self, IdlError> {
        let mut ids = Vec::new();
        ids.try_reserve_exact(config.baseline)?;
        Ok(Self {
            ids,
            capacity: config.baseline,
            range: None,
            config,
        })
    }

    /// Return the list configuration.
    pub fn config(&self) -> IdlConfig {
        self.config
    }

    /// Return the baseline capacity.
    pub fn baseline(&self) -> usize {
        self.config.baseline
    }

    /// Return the current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return count of identifiers.
    ///
    /// A list in range form reports the number of identifiers its bounds cover.
    pub fn len(&self) -> usize {
        match &self.range {
            Some(range) => range.span(),
            None => self.ids.len(),
        }
    }

    /// Is the list empty?
    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.ids.is_empty()
    }

    /// Is the list in range form?
    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// Return the bounds of a list in range form.
    pub fn range(&self) -> Option<IdRange> {
        self.range
    }

    /// The explicit identifiers, in their current order.
    ///
    /// Empty for a list in range form.
    pub fn as_slice(&self) -> &[Id] {
        &self.ids
    }

    /// Iterate over the explicit identifiers.
    pub fn iter(&self) -> std::slice::Iter<'_, Id> {
        self.ids.iter()
    }

    /// Does the list contain this identifier?
    ///
    /// For a list in range form, answers whether the identifier falls within its bounds.
    pub fn contains(&self, id: Id) -> bool {
        match &self.range {
            Some(range) => range.contains(id),
            None => self.ids.contains(&id),
        }
    }

    /// Add an identifier to the end of the list.
    ///
    /// No ordering or duplicate checks are made; call [`sort`](Idl::sort) once appending is
    /// complete. On failure the list is unchanged.
    pub fn append(&mut self, id: Id) -> Result<(), IdlError> {
        if let Some(range) = &mut self.range {
            range.widen(id);
        } else {
            if self.ids.len() >= self.capacity {
                self.grow(self.capacity + self.config.baseline)?;
            }
            self.ids.push(id);
        }
        stats::record_idl(|c| c.appends += 1);
        Ok(())
    }

    /// Add many identifiers to the end of the list.
    ///
    /// Either all of `ids` are appended or, on failure, none are.
    pub fn append_list(&mut self, ids: &[Id]) -> Result<(), IdlError> {
        if let Some(range) = &mut self.range {
            ids.iter().for_each(|id| range.widen(*id));
        } else {
            let needed = self.ids.len() + ids.len();
            if needed > self.capacity {
                self.grow(self.config.capacity_for(needed))?;
            }
            self.ids.extend_from_slice(ids);
        }
        stats::record_idl(|c| c.appends += ids.len() as u64);
        Ok(())
    }

    /// Release excess storage, returning the list to its baseline capacity.
    ///
    /// Returns true if storage was released. Callers should only shrink a list they know to
    /// be empty or small: identifiers beyond the baseline capacity are discarded.
    pub fn shrink(&mut self) -> bool {
        if self.capacity <= self.config.baseline {
            return false;
        }
        let baseline = self.config.baseline;
        if self.ids.len() > baseline {
            tracing::warn!(
                count = self.ids.len(),
                baseline,
                "shrinking identifier list discards {} identifiers",
                self.ids.len() - baseline
            );
            self.ids.truncate(baseline);
        }
        self.ids.shrink_to(baseline);
        tracing::debug!(from = self.capacity, to = baseline, "shrunk identifier list");
        self.capacity = baseline;
        stats::record_idl(|c| c.shrinks += 1);
        true
    }

    /// Sort the list into strictly descending order.
    ///
    /// The list is sorted in place and no memory is allocated. A list in range form is left
    /// as is.
    pub fn sort(&mut self) {
        if self.range.is_some() {
            return;
        }
        sort::sort_descending(&mut self.ids);
        stats::record_idl(|c| c.sorts += 1);
    }

    /// Binary search for an identifier in a list ordered by `direction`.
    ///
    /// Returns the position of `id` if present, else the position at which it would be inserted
    /// to preserve the order.
    pub fn search(&self, id: Id, direction: Direction) -> Result<usize, IdlError> {
        if let Some(range) = self.range {
            return Err(IdlError::RangeForm(range));
        }
        Ok(search_ordered(&self.ids, id, direction).unwrap_or_else(|pos| pos))
    }

    /// Insert an identifier into a descending list, keeping it in order.
    ///
    /// Appending and sorting once is cheaper; this is the older incremental path. When the
    /// list reaches its range threshold it collapses into range form. An identifier which is
    /// already present (or within the bounds of a range) is rejected.
    pub fn insert(&mut self, id: Id) -> Result<(), IdlError> {
        if let Some(range) = &mut self.range {
            if range.contains(id) {
                return Err(IdlError::Duplicate(id));
            }
            range.widen(id);
            stats::record_idl(|c| c.inserts += 1);
            return Ok(());
        }

        let pos = match search_ordered(&self.ids, id, Direction::Descending) {
            Ok(_) => return Err(IdlError::Duplicate(id)),
            Err(pos) => pos,
        };

        if self.ids.len() + 1 >= self.config.range_threshold {
            self.collapse(id);
        } else {
            if self.ids.len() >= self.capacity {
                self.grow(self.capacity + self.config.baseline)?;
            }
            self.ids.insert(pos, id);
        }
        stats::record_idl(|c| c.inserts += 1);
        Ok(())
    }

    /// Merge another descending list into this descending list.
    ///
    /// Identifiers present in both lists appear once. Merging into, or from, a list in range
    /// form widens the result into range form. Two explicit lists must both be strictly
    /// descending, otherwise [`IdlError::Unsorted`] is returned and neither list changes.
    pub fn merge(&mut self, other: &Idl) -> Result<(), IdlError> {
        if let Some(mut range) = other.range {
            if let Some(ours) = self.range {
                range.widen(ours.low);
                range.widen(ours.high);
            }
            self.ids.iter().for_each(|id| range.widen(*id));
            self.ids.clear();
            self.range = Some(range);
            stats::record_idl(|c| c.merges += 1);
            return Ok(());
        }
        if let Some(range) = &mut self.range {
            other.ids.iter().for_each(|id| range.widen(*id));
            stats::record_idl(|c| c.merges += 1);
            return Ok(());
        }

        check_descending(&self.ids)?;
        check_descending(&other.ids)?;

        let mut merged = Vec::new();
        let capacity = self
            .capacity
            .max(self.config.capacity_for(self.ids.len() + other.ids.len()));
        merged.try_reserve_exact(capacity)?;

        let (mut ours, mut theirs) = (self.ids.iter().peekable(), other.ids.iter().peekable());
        loop {
            let next = match (ours.peek().copied(), theirs.peek().copied()) {
                (Some(a), Some(b)) if a > b => ours.next(),
                (Some(a), Some(b)) if a < b => theirs.next(),
                (Some(_), Some(_)) => {
                    theirs.next();
                    ours.next()
                }
                (Some(_), None) => ours.next(),
                (None, Some(_)) => theirs.next(),
                (None, None) => break,
            };
            merged.extend(next);
        }

        self.ids = merged;
        self.capacity = capacity;
        stats::record_idl(|c| c.merges += 1);
        Ok(())
    }

    /// Serialize the list into a page image.
    ///
    /// The image is a sequence of slots. The first holds the element count (or [`NOID`] for
    /// range form) and the elements (or the low and high bounds) follow it.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let slots: Vec<Id> = match &self.range {
            Some(range) => vec![NOID, range.low, range.high],
            None => std::iter::once(self.ids.len() as Id)
                .chain(self.ids.iter().copied())
                .collect(),
        };
        BINCODER.serialize(&slots).map_err(|e| e.into())
    }

    /// Deserialize a list from a page image produced by [`encode`](Idl::encode).
    pub fn decode(buf: &[u8], config: IdlConfig) -> Result<Self> {
        let slots: Vec<Id> = BINCODER.deserialize(buf)?;
        let (count, elements) = slots
            .split_first()
            .ok_or_else(|| IdlError::Malformed("missing count slot".to_string()))?;

        if *count == NOID {
            let [low, high] = elements else {
                return Err(IdlError::Malformed(format!(
                    "range form needs 2 bounds, found {}",
                    elements.len()
                ))
                .into());
            };
            if low > high {
                return Err(IdlError::Malformed(format!("range bounds {low} > {high}")).into());
            }
            tracing::debug!(low, high, "decoded identifier range");
            let mut idl = Idl::with_config(config)?;
            idl.range = Some(IdRange {
                low: *low,
                high: *high,
            });
            return Ok(idl);
        }

        if *count != elements.len() as Id {
            return Err(IdlError::Malformed(format!(
                "count slot {count} but {} elements",
                elements.len()
            ))
            .into());
        }

        let capacity = config.capacity_for(elements.len());
        let mut ids = Vec::new();
        ids.try_reserve_exact(capacity).map_err(IdlError::from)?;
        ids.extend_from_slice(elements);
        tracing::debug!(count, capacity, "decoded identifier list");
        Ok(Self {
            ids,
            capacity,
            range: None,
            config,
        })
    }

    /// Grow capacity to `capacity`, leaving the list untouched on failure.
    fn grow(&mut self, capacity: usize) -> Result<(), IdlError> {
        self.ids.try_reserve_exact(capacity - self.ids.len())?;
        tracing::debug!(from = self.capacity, to = capacity, "grew identifier list");
        self.capacity = capacity;
        stats::record_idl(|c| c.grows += 1);
        Ok(())
    }

    /// Replace the explicit elements, plus `id`, with the range covering them.
    fn collapse(&mut self, id: Id) {
        let mut range = IdRange { low: id, high: id };
        if let (Some(first), Some(last)) = (self.ids.first(), self.ids.last()) {
            range.widen(*first);
            range.widen(*last);
        }
        tracing::debug!(
            count = self.ids.len() + 1,
            low = range.low,
            high = range.high,
            "collapsed identifier list into range form"
        );
        self.ids.clear();
        self.range = Some(range);
        stats::record_idl(|c| c.collapses += 1);
    }
}

impl<'a> IntoIterator for &'a Idl {
    type Item = &'a Id;
    type IntoIter = std::slice::Iter<'a, Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Binary search of `ids`, which must be ordered by `direction`.
fn search_ordered(ids: &[Id], id: Id, direction: Direction) -> Result<usize, usize> {
    match direction {
        Direction::Ascending => ids.binary_search(&id),
        Direction::Descending => ids.binary_search_by(|elem| id.cmp(elem)),
    }
}

/// Reject a list which is not strictly descending, reporting the first position out of order.
fn check_descending(ids: &[Id]) -> Result<(), IdlError> {
    match ids.windows(2).position(|w| w[0] <= w[1]) {
        Some(pos) => Err(IdlError::Unsorted(pos + 1)),
        None => Ok(()),
    }
}
