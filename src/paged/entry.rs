//! Paged Entry Module
//!
//! An entry whose value is a live view over items held in a shared item cache.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Entry, EntryMeta, KeyedCache};
use crate::error::CacheError;
use crate::stream::{CombineLatest, EntryStream, Event, Listener, Sink, Subject};

/// Maps an item to its identity in the shared item cache.
pub type IdFn<I, Id> = Arc<dyn Fn(&I) -> Id + Send + Sync>;

/// Page of items composed from the shared item cache.
///
/// The page stores only its member listeners; item state lives in the item
/// cache. Any update to a member item re-publishes the whole page.
pub struct PagedEntry<Id, I> {
    meta: EntryMeta,
    subject: Subject<Vec<I>>,
    items: KeyedCache<Id, I>,
    to_id: IdFn<I, Id>,
    /// Combined subscription over the current members
    members: Vec<Listener>,
}

impl<Id, I> PagedEntry<Id, I>
where
    Id: Eq + Hash + Clone + Send + 'static,
    I: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(max_age: Option<Duration>, items: KeyedCache<Id, I>, to_id: IdFn<I, Id>) -> Self {
        Self {
            meta: EntryMeta::new(max_age),
            subject: Subject::new(),
            items,
            to_id,
            members: Vec::new(),
        }
    }

    /// Number of items the page is currently wired to.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl<Id, I> Entry<Vec<I>> for PagedEntry<Id, I>
where
    Id: Eq + Hash + Clone + Send + 'static,
    I: Clone + PartialEq + Send + Sync + 'static,
{
    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntryMeta {
        &mut self.meta
    }

    fn peek(&self) -> Option<Vec<I>> {
        self.subject.last()
    }

    // == Set Value ==
    /// Writes every item to the shared cache and rewires the page to them.
    ///
    /// The old fan-in is dropped before items are written so a refresh never
    /// publishes a half-updated page. Each item is held by a no-op listener
    /// while it is written so the eviction passes triggered by later writes
    /// cannot drop it before the new fan-in is attached.
    fn set_value(&mut self, page: Vec<I>) {
        if self.meta.is_stale() {
            self.subject.take_last();
        }
        self.meta.written();
        self.members.clear();

        let ids: Vec<Id> = page.iter().map(|item| (self.to_id)(item)).collect();
        let hold: Sink<I> = Arc::new(|_: &Event<I>| {});
        let keep_alive: Vec<Listener> = ids
            .iter()
            .zip(page)
            .map(|(id, item)| {
                let listener = self.items.listen(id.clone(), Arc::clone(&hold), false);
                self.items.set(id.clone(), item);
                listener
            })
            .collect();

        if ids.is_empty() {
            // A zero-source combine would never publish
            self.subject.emit(Vec::new());
        } else {
            let combined = CombineLatest::new(ids.len(), self.subject.clone());
            self.members = ids
                .into_iter()
                .enumerate()
                .map(|(index, id)| self.items.listen(id, combined.sink(index), true))
                .collect();
        }

        drop(keep_alive);
    }

    fn subscribe(&mut self) -> EntryStream<Vec<I>> {
        self.meta.touch();
        self.subject.subscribe(!self.meta.is_stale())
    }

    fn listen(&mut self, sink: Sink<Vec<I>>, replay: bool) -> Listener {
        self.subject.listen(sink, replay)
    }

    fn emit_error(&self, err: CacheError) {
        self.subject.emit_error(err);
    }

    fn has_listeners(&self) -> bool {
        self.subject.listener_count() > 0
    }

    fn dispose(&mut self) {
        self.members.clear();
        self.subject.close();
    }
}
