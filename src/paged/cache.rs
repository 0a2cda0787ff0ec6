//! Paged Cache Module
//!
//! A keyed cache of item lists whose items live once in a shared item cache.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::{CacheStats, EntryFactory, KeyedCache, StreamOptions, Trim};
use crate::config::PagedConfig;
use crate::paged::{IdFn, PagedEntry};
use crate::stream::EntryStream;

// == Paged Cache ==
/// Cache of pages (`Vec<I>`) keyed by `K`, backed by one item cache keyed by `Id`.
///
/// Writing a page forwards every item into the item cache; editing an item in
/// the item cache updates every live page containing it. `to_id` must be
/// injective within one page: two items with the same id share one slot and
/// the later one wins.
pub struct PagedCache<K, Id, I> {
    pages: KeyedCache<K, Vec<I>, PagedEntry<Id, I>>,
    items: KeyedCache<Id, I>,
}

impl<K, Id, I> Clone for PagedCache<K, Id, I> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
            items: self.items.clone(),
        }
    }
}

impl<K, Id, I> PagedCache<K, Id, I>
where
    K: Eq + Hash + Clone + Send + 'static,
    Id: Eq + Hash + Clone + Send + 'static,
    I: Clone + PartialEq + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a paged cache. The item cache bound is derived from `config`.
    pub fn new<F>(config: PagedConfig, to_id: F) -> Self
    where
        F: Fn(&I) -> Id + Send + Sync + 'static,
    {
        let items = KeyedCache::new(config.item_config());
        let to_id: IdFn<I, Id> = Arc::new(to_id);
        let shared = items.clone();
        let factory: EntryFactory<PagedEntry<Id, I>> = Arc::new(move |max_age| {
            PagedEntry::new(max_age, shared.clone(), Arc::clone(&to_id))
        });

        Self {
            pages: KeyedCache::with_factory(config.pages, factory),
            items,
        }
    }

    /// The shared item cache. Writes to it propagate to every page holding the item.
    pub fn items(&self) -> &KeyedCache<Id, I> {
        &self.items
    }

    pub fn get(&self, key: &K) -> Option<Vec<I>> {
        self.pages.get(key)
    }

    pub fn set(&self, key: K, page: Vec<I>) {
        self.pages.set(key, page);
    }

    pub fn remove(&self, key: &K) -> Option<Vec<I>> {
        self.pages.remove(key)
    }

    /// Live page subscription; see [`KeyedCache::stream`].
    pub fn stream(&self, key: K, options: StreamOptions<Vec<I>>) -> EntryStream<Vec<I>> {
        self.pages.stream(key, options)
    }

    pub fn watch(&self, key: K) -> EntryStream<Vec<I>> {
        self.pages.watch(key)
    }

    /// Optimistic page update; the new items are written to the item cache too.
    pub async fn optimistic<U, F, Fut, Failure>(
        &self,
        key: &K,
        update: U,
        callback: F,
    ) -> std::result::Result<(), Failure>
    where
        U: FnOnce(&Vec<I>) -> Vec<I>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), Failure>>,
    {
        self.pages.optimistic(key, update, callback).await
    }

    /// Disposes every page and every item.
    pub fn clear(&self) {
        self.pages.clear();
        self.items.clear();
    }

    pub fn dispose(&self) {
        self.pages.dispose();
        self.items.dispose();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.pages.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page-level statistics.
    pub fn stats(&self) -> CacheStats {
        self.pages.stats()
    }

    /// Item-level statistics.
    pub fn item_stats(&self) -> CacheStats {
        self.items.stats()
    }
}

impl<K, Id, I> Trim for PagedCache<K, Id, I>
where
    K: Eq + Hash + Clone + Send + 'static,
    Id: Eq + Hash + Clone + Send + 'static,
    I: Clone + PartialEq + Send + Sync + 'static,
{
    /// Trims pages first so items released by evicted pages go in the same pass.
    fn trim(&self) -> usize {
        self.pages.trim() + self.items.trim()
    }
}

impl<K, Id, I> std::fmt::Debug for PagedCache<K, Id, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedCache")
            .field("pages", &self.pages)
            .field("items", &self.items)
            .finish()
    }
}
