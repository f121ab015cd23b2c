#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod capacity;

pub mod probe;

/// A hash map using open addressing with double hashing.
///
/// Removal leaves tombstones so that probe chains through the removed slot
/// stay intact. Tombstones are reused by inserts and purged on resize.
pub mod open_table;

/// A hash map using d-way cuckoo hashing.
///
/// Every key has exactly one candidate slot per sub-table, so lookups are
/// bounded by the number of sub-tables.
pub mod cuckoo_table;

/// The map contract shared by both table types.
pub mod map;

/// Error and result types for table operations.
pub mod error;

#[cfg(any(test, feature = "stats"))]
pub mod stats;

pub use capacity::CapacitySequence;
pub use cuckoo_table::CuckooTable;
pub use error::Error;
pub use error::Result;
pub use map::Map;
pub use open_table::OpenAddressingTable;
pub use probe::ProbeHasher;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used by `new` and `with_capacity`.
        pub type DefaultHashBuilder = foldhash::fast::FixedState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used by `new` and `with_capacity`.
        pub type DefaultHashBuilder = core::hash::BuildHasherDefault<std::hash::DefaultHasher>;
    }
}
