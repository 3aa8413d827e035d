#![warn(missing_docs)]
//! Pageset
//!
//! Identifier sets for a copy-on-write B-tree storage engine.
//!
//! # Implementation Details
//!
//! A storage engine of this kind names its pages with small integers and spends a lot of its
//! time shuffling sets of them around: the free-page list, the pages dirtied by the current
//! write transaction and so on. This crate provides the two collections used for that
//! bookkeeping:
//!
//!  - [`Idl`](idl::Idl): a growable set of page identifiers. Identifiers are appended in any
//!    order and the list is sorted, largest first, when it is needed. Very large sets may be
//!    held in a compact "range form" which only records the lowest and highest identifier.
//!  - [`Id2l`](id2l::Id2l): a bounded, ascending map from page identifier to a handle for the
//!    in-memory copy of that page. The handle is never owned by the list.
//!
//! Neither collection does any locking. A write transaction owns its lists and is the only
//! mutator; a sorted list that is no longer changing may be shared by reference.
//!
//! An [`Idl`](idl::Idl) can be written out as a page image with [`encode`](idl::Idl::encode):
//! the element count sits in the first slot and the elements follow it, so page code can read
//! the image in place.
//!
//! Optional operation counters live in [`stats`].
//!

pub mod id2l;
pub mod idl;
pub mod stats;

use bincode::config::AllowTrailing;
use bincode::config::FixintEncoding;
use bincode::config::WithOtherIntEncoding;
use bincode::config::WithOtherTrailing;
use bincode::{DefaultOptions, Options};
use std::sync::LazyLock;
use strum::EnumString;

// Re-export
pub use self::id2l::Id2l;
pub use self::idl::Idl;

/// A page identifier.
pub type Id = u64;

/// When comparing or ordering identifiers, ascending or descending order.
#[derive(Clone, Copy, Debug, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    /// Smallest identifier first.
    Ascending,
    /// Largest identifier first.
    Descending,
}

/// Shared bincode configuration for page images and anything stored alongside them.
///
/// Integers are fixed width and trailing bytes are allowed, so a record can be read back
/// from a padded buffer.
pub static BINCODER: LazyLock<
    WithOtherIntEncoding<WithOtherTrailing<DefaultOptions, AllowTrailing>, FixintEncoding>,
> = LazyLock::new(|| {
    bincode::DefaultOptions::new()
        .allow_trailing_bytes()
        .with_fixint_encoding()
});
