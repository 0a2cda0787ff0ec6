//! Cache Entry Module
//!
//! The capability shared by every entry variant plus the timestamp bookkeeping
//! used for TTL and LRU decisions.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::CacheError;
use crate::stream::{EntryStream, Listener, Sink};

static ACCESS_SEQ: AtomicU64 = AtomicU64::new(0);

// == Stamp ==
/// A point in time plus a process-wide sequence number.
///
/// The sequence breaks ties between accesses that land on the same instant, so
/// ordering by stamp is a strict recency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp {
    pub at: Instant,
    seq: u64,
}

impl Stamp {
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            seq: ACCESS_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }
}

// == Entry Meta ==
/// Timestamps and TTL common to all entry variants.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Last value write
    pub created: Stamp,
    /// Last read, write or subscription
    pub accessed: Stamp,
    /// Effective time-to-live, None = never stale
    pub max_age: Option<Duration>,
}

impl EntryMeta {
    pub fn new(max_age: Option<Duration>) -> Self {
        let now = Stamp::now();
        Self {
            created: now,
            accessed: now,
            max_age,
        }
    }

    pub fn touch(&mut self) {
        self.accessed = Stamp::now();
    }

    /// Records a value write, advancing both timestamps.
    pub fn written(&mut self) {
        let now = Stamp::now();
        self.created = now;
        self.accessed = now;
    }

    /// True once strictly more than `max_age` has elapsed since the last write.
    pub fn is_stale(&self) -> bool {
        match self.max_age {
            Some(max_age) => Instant::now().saturating_duration_since(self.created.at) > max_age,
            None => false,
        }
    }

    pub fn rank(&self) -> EvictionRank {
        EvictionRank {
            fresh: !self.is_stale(),
            accessed: self.accessed,
        }
    }
}

// == Eviction Rank ==
/// Sort key for eviction: stale before fresh, then least recently accessed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionRank {
    pub fresh: bool,
    pub accessed: Stamp,
}

impl Ord for EvictionRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fresh
            .cmp(&other.fresh)
            .then_with(|| self.accessed.cmp(&other.accessed))
    }
}

impl PartialOrd for EvictionRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// == Entry Trait ==
/// One cache slot: a value, its timestamps and its subscribers.
///
/// Implemented by [`SingleEntry`](crate::cache::SingleEntry) for plain values and
/// by [`PagedEntry`](crate::paged::PagedEntry) for lists composed from a shared
/// item cache.
pub trait Entry<V>: Send + 'static {
    fn meta(&self) -> &EntryMeta;

    fn meta_mut(&mut self) -> &mut EntryMeta;

    /// Stored value ignoring staleness, without touching `accessed`.
    fn peek(&self) -> Option<V>;

    /// Writes a value, notifying subscribers when it differs from the current one.
    fn set_value(&mut self, value: V);

    /// Opens a subscription, replaying the current value if it is not stale.
    fn subscribe(&mut self) -> EntryStream<V>;

    /// Attaches an internal sink that counts as a listener.
    fn listen(&mut self, sink: Sink<V>, replay: bool) -> Listener;

    /// Forwards a failure to every subscriber.
    fn emit_error(&self, err: CacheError);

    fn has_listeners(&self) -> bool;

    /// Closes every subscription and discards the value.
    fn dispose(&mut self);

    // == Provided ==
    /// Reads the value, refreshing `accessed`. Stale values read as absent.
    fn value(&mut self) -> Option<V> {
        self.meta_mut().touch();
        if self.is_stale() {
            return None;
        }
        self.peek()
    }

    fn is_stale(&self) -> bool {
        self.meta().is_stale()
    }

    fn max_age(&self) -> Option<Duration> {
        self.meta().max_age
    }

    fn set_max_age(&mut self, max_age: Option<Duration>) {
        self.meta_mut().max_age = max_age;
    }

    fn rank(&self) -> EvictionRank {
        self.meta().rank()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_are_strictly_ordered() {
        let first = Stamp::now();
        let second = Stamp::now();
        assert!(first < second);
    }

    #[test]
    fn test_meta_without_max_age_never_stale() {
        let meta = EntryMeta::new(None);
        assert!(!meta.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_meta_stale_after_max_age() {
        let meta = EntryMeta::new(Some(Duration::from_secs(1)));
        assert!(!meta.is_stale());

        // Exactly max_age is still fresh
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!meta.is_stale());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(meta.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_resets_staleness() {
        let mut meta = EntryMeta::new(Some(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(meta.is_stale());

        meta.written();
        assert!(!meta.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rank_puts_stale_before_recently_accessed() {
        let mut stale = EntryMeta::new(Some(Duration::from_millis(10)));
        let fresh = EntryMeta::new(None);
        tokio::time::advance(Duration::from_millis(20)).await;

        stale.touch();
        assert!(stale.accessed > fresh.accessed);
        assert!(stale.rank() < fresh.rank());
    }

    #[test]
    fn test_rank_orders_by_access_among_fresh() {
        let older = EntryMeta::new(None);
        let newer = EntryMeta::new(None);
        assert!(older.rank() < newer.rank());
    }
}
