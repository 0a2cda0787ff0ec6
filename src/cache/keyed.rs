//! Keyed Cache Module
//!
//! Main cache engine: a shared key to entry mapping with LRU + TTL eviction,
//! lazy loading and optimistic updates.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::entry::{Entry, EvictionRank};
use crate::cache::options::{Loader, StreamOptions};
use crate::cache::{CacheStats, SingleEntry, Trim};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::stream::{EntryStream, Listener, Sink};

/// Builds a fresh entry with the cache's default TTL.
pub(crate) type EntryFactory<E> = Arc<dyn Fn(Option<Duration>) -> E + Send + Sync>;

// == Slot ==
/// An entry plus the bookkeeping only the cache needs.
struct Slot<E> {
    entry: E,
    /// Unique per created entry, so late loads and rollbacks can tell a
    /// replaced entry from the one they started on
    id: u64,
    /// In-flight loader marker
    loading: bool,
}

/// Identifies the entry a spawned loader will write back to.
struct LoadTicket<K> {
    key: K,
    slot: u64,
    generation: u64,
    max_age: Option<Duration>,
}

// == Cache State ==
struct CacheState<K, V, E> {
    entries: HashMap<K, Slot<E>>,
    config: CacheConfig,
    stats: CacheStats,
    factory: EntryFactory<E>,
    next_slot: u64,
    /// Bumped by `clear` so loads started earlier are discarded
    generation: u64,
    disposed: bool,
    _value: PhantomData<fn() -> V>,
}

impl<K, V, E> CacheState<K, V, E>
where
    K: Eq + Hash + Clone,
    E: Entry<V>,
{
    /// Returns the slot for `key`, creating it (after an eviction pass) if absent.
    fn slot_mut(&mut self, key: K) -> &mut Slot<E> {
        if !self.entries.contains_key(&key) {
            self.trim(1);
            trace!(entries = self.entries.len() + 1, "Creating cache entry");
        }
        let factory = &self.factory;
        let max_age = self.config.max_age;
        let next_slot = &mut self.next_slot;
        self.entries.entry(key).or_insert_with(|| {
            let id = *next_slot;
            *next_slot += 1;
            Slot {
                entry: factory(max_age),
                id,
                loading: false,
            }
        })
    }

    // == Trim ==
    /// Eviction pass over entries without listeners.
    ///
    /// Orphans are sorted stale-first then least-recently-accessed-first. With
    /// a size bound, the first `orphans + reserve - size` are removed; with a
    /// TTL, every remaining stale orphan is removed too.
    fn trim(&mut self, reserve: usize) -> usize {
        let mut orphans: Vec<(EvictionRank, K)> = self
            .entries
            .iter()
            .filter(|(_, slot)| !slot.entry.has_listeners())
            .map(|(key, slot)| (slot.entry.rank(), key.clone()))
            .collect();
        orphans.sort_by(|a, b| a.0.cmp(&b.0));

        let overflow = match self.config.size {
            Some(size) => (orphans.len() + reserve).saturating_sub(size),
            None => 0,
        };
        let overflow = overflow.min(orphans.len());
        let mut doomed: Vec<K> = orphans.drain(..overflow).map(|(_, key)| key).collect();

        if self.config.max_age.is_some() {
            doomed.extend(
                orphans
                    .into_iter()
                    .filter(|(rank, _)| !rank.fresh)
                    .map(|(_, key)| key),
            );
        }

        for key in &doomed {
            if let Some(mut slot) = self.entries.remove(key) {
                slot.entry.dispose();
            }
        }

        let removed = doomed.len();
        if removed > 0 {
            self.stats.record_evictions(removed);
            debug!(
                removed,
                remaining = self.entries.len(),
                "Evicted orphaned cache entries"
            );
        }
        removed
    }
}

// == Keyed Cache ==
/// Reactive keyed cache with LRU + TTL eviction.
///
/// Cloning yields another handle to the same cache. Entries with at least one
/// listener are never evicted; the `size` bound only counts orphaned entries.
pub struct KeyedCache<K, V, E = SingleEntry<V>> {
    state: Arc<Mutex<CacheState<K, V, E>>>,
}

impl<K, V, E> Clone for KeyedCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache of plain values.
    pub fn new(config: CacheConfig) -> Self {
        let factory: EntryFactory<SingleEntry<V>> = Arc::new(SingleEntry::new);
        Self::with_factory(config, factory)
    }
}

impl<K, V, E> KeyedCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    E: Entry<V>,
{
    pub(crate) fn with_factory(config: CacheConfig, factory: EntryFactory<E>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                config,
                stats: CacheStats::new(),
                factory,
                next_slot: 0,
                generation: 0,
                disposed: false,
                _value: PhantomData,
            })),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.state.lock().config
    }

    // == Get ==
    /// Returns the current value if present and not stale.
    ///
    /// Never creates an entry. A stale value reads as absent but stays stored
    /// until the next eviction pass.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let value = state
            .entries
            .get_mut(key)
            .and_then(|slot| slot.entry.value());
        if value.is_some() {
            state.stats.record_hit();
        } else {
            state.stats.record_miss();
        }
        value
    }

    // == Set ==
    /// Stores a value, creating the entry if absent.
    ///
    /// Subscribers are notified only when the value differs from the current one.
    pub fn set(&self, key: K, value: V) {
        let mut state = self.state.lock();
        if state.disposed {
            trace!("Ignoring set on disposed cache");
            return;
        }
        state.slot_mut(key).entry.set_value(value);
    }

    // == Remove ==
    /// Detaches and disposes the entry, returning its last value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut slot = self.state.lock().entries.remove(key)?;
        let value = slot.entry.peek();
        slot.entry.dispose();
        value
    }

    // == Stream ==
    /// Opens a live subscription to `key`.
    ///
    /// The current value is replayed first when present and fresh. When the
    /// entry holds no fresh value and no load is already in flight, the
    /// `if_absent` loader from `options` is spawned onto the Tokio runtime; its
    /// result is stored with `options.max_age` (falling back to the cache
    /// default) as the entry's TTL. Loader failures arrive as `Err` items and
    /// leave the entry unpopulated.
    ///
    /// Must be called within a Tokio runtime when a loader is supplied.
    pub fn stream(&self, key: K, options: StreamOptions<V>) -> EntryStream<V> {
        let mut state = self.state.lock();
        if state.disposed {
            return EntryStream::closed();
        }
        let generation = state.generation;
        let max_age = options.max_age.or(state.config.max_age);

        let slot = state.slot_mut(key.clone());
        let stream = slot.entry.subscribe();
        let Some(loader) = options.if_absent else {
            return stream;
        };
        if slot.loading || slot.entry.value().is_some() {
            return stream;
        }
        slot.loading = true;
        let ticket = LoadTicket {
            key,
            slot: slot.id,
            generation,
            max_age,
        };
        drop(state);

        self.spawn_load(ticket, loader);
        stream
    }

    /// Shorthand for a subscription without a loader.
    pub fn watch(&self, key: K) -> EntryStream<V> {
        self.stream(key, StreamOptions::default())
    }

    fn spawn_load(&self, ticket: LoadTicket<K>, loader: Loader<V>) {
        let cache = self.clone();
        debug!(slot = ticket.slot, "Spawning loader for absent entry");
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { loader().await })
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CacheError::load_failed(err)),
                Err(_) => Err(CacheError::LoaderPanicked),
            };
            cache.finish_load(ticket, result);
        });
    }

    fn finish_load(&self, ticket: LoadTicket<K>, result: Result<V>) {
        let mut state = self.state.lock();
        if state.disposed || state.generation != ticket.generation {
            debug!(slot = ticket.slot, "Discarding load result after clear");
            return;
        }
        if let Some(slot) = state.entries.get(&ticket.key) {
            if slot.id != ticket.slot {
                debug!(slot = ticket.slot, "Discarding load result for replaced entry");
                return;
            }
        }

        match result {
            Ok(value) => {
                // Recreated here if the entry was evicted while loading
                let slot = state.slot_mut(ticket.key);
                slot.loading = false;
                // Staleness is judged under the age the subscribers saw
                slot.entry.set_value(value);
                slot.entry.set_max_age(ticket.max_age);
                state.stats.record_load();
                trace!(slot = ticket.slot, "Stored loader result");
            }
            Err(err) => {
                if let Some(slot) = state.entries.get_mut(&ticket.key) {
                    slot.loading = false;
                    slot.entry.emit_error(err);
                }
                state.stats.record_load_failure();
                debug!(slot = ticket.slot, "Loader failed");
            }
        }
    }

    // == Optimistic ==
    /// Applies `update` immediately, then awaits `callback`.
    ///
    /// On failure the previous value is written back and the callback's error
    /// is returned unchanged. When the key holds no fresh value only
    /// `callback` runs. No rollback happens if the entry was removed or
    /// replaced while the callback was pending.
    ///
    /// `update` runs outside the cache lock and may read the cache.
    pub async fn optimistic<U, F, Fut, Failure>(
        &self,
        key: &K,
        update: U,
        callback: F,
    ) -> std::result::Result<(), Failure>
    where
        U: FnOnce(&V) -> V,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), Failure>>,
    {
        let snapshot = self.apply_optimistic(key, update);
        let outcome = callback().await;
        if outcome.is_err() {
            if let Some((slot, old)) = snapshot {
                self.rollback(key, slot, old);
            }
        }
        outcome
    }

    fn apply_optimistic<U>(&self, key: &K, update: U) -> Option<(u64, V)>
    where
        U: FnOnce(&V) -> V,
    {
        let (slot_id, old) = {
            let mut state = self.state.lock();
            let slot = state.entries.get_mut(key)?;
            (slot.id, slot.entry.value()?)
        };
        let updated = update(&old);

        let mut state = self.state.lock();
        match state.entries.get_mut(key) {
            Some(slot) if slot.id == slot_id => {
                slot.entry.set_value(updated);
                Some((slot_id, old))
            }
            _ => None,
        }
    }

    fn rollback(&self, key: &K, slot_id: u64, old: V) {
        let mut state = self.state.lock();
        let restored = match state.entries.get_mut(key) {
            Some(slot) if slot.id == slot_id => {
                slot.entry.set_value(old);
                true
            }
            _ => false,
        };
        if restored {
            state.stats.record_rollback();
            debug!(slot = slot_id, "Rolled back optimistic update");
        } else {
            debug!(slot = slot_id, "Entry gone, skipping rollback");
        }
    }

    // == Listen ==
    /// Attaches an internal sink to `key`, creating the entry if absent.
    pub(crate) fn listen(&self, key: K, sink: Sink<V>, replay: bool) -> Listener {
        let mut state = self.state.lock();
        if state.disposed {
            return Listener::detached();
        }
        state.slot_mut(key).entry.listen(sink, replay)
    }

    // == Clear / Dispose ==
    /// Disposes every entry. The cache stays usable.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let entries = std::mem::take(&mut state.entries);
        state.generation += 1;
        if !entries.is_empty() {
            debug!(cleared = entries.len(), "Cleared cache");
        }
        for (_, mut slot) in entries {
            slot.entry.dispose();
        }
    }

    /// Clears the cache and turns later `set`/`stream` calls into no-ops.
    pub fn dispose(&self) {
        self.clear();
        self.state.lock().disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    // == Trim ==
    /// Runs an eviction pass without reserving room for a new entry.
    pub fn trim(&self) -> usize {
        self.state.lock().trim(0)
    }

    // == Inspection ==
    /// True if an entry exists for `key`, stale or not.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.total_entries = state.entries.len();
        stats.listened_entries = state
            .entries
            .values()
            .filter(|slot| slot.entry.has_listeners())
            .count();
        stats
    }
}

impl<K, V, E> Trim for KeyedCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    E: Entry<V>,
{
    fn trim(&self) -> usize {
        KeyedCache::trim(self)
    }
}

impl<K, V, E> std::fmt::Debug for KeyedCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("KeyedCache")
            .field("entries", &state.entries.len())
            .field("config", &state.config)
            .field("disposed", &state.disposed)
            .finish()
    }
}
