//! Cache Module
//!
//! Reactive keyed caching with TTL expiration, LRU eviction of orphaned
//! entries and optimistic updates.

mod entry;
mod keyed;
mod options;
mod single;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{Entry, EntryMeta, EvictionRank, Stamp};
pub use keyed::KeyedCache;
pub(crate) use keyed::EntryFactory;
pub use options::{Loader, StreamOptions};
pub use single::SingleEntry;
pub use stats::CacheStats;

// == Trim ==
/// A cache that supports a standalone eviction pass.
pub trait Trim: Send + Sync + 'static {
    /// Evicts overflowing and stale orphaned entries, returning how many were removed.
    fn trim(&self) -> usize;
}
