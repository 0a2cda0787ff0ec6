//! Single Entry Module
//!
//! The native entry variant of a keyed cache: one plain stored value.

use std::time::Duration;

use crate::cache::entry::{Entry, EntryMeta};
use crate::error::CacheError;
use crate::stream::{EntryStream, Listener, Sink, Subject};

/// Entry holding one value in its subject's replay slot.
pub struct SingleEntry<V> {
    meta: EntryMeta,
    subject: Subject<V>,
}

impl<V> SingleEntry<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            meta: EntryMeta::new(max_age),
            subject: Subject::new(),
        }
    }
}

impl<V> Entry<V> for SingleEntry<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntryMeta {
        &mut self.meta
    }

    fn peek(&self) -> Option<V> {
        self.subject.last()
    }

    fn set_value(&mut self, value: V) {
        // A stale value reads as absent, so an equal rewrite still notifies
        if self.meta.is_stale() {
            self.subject.take_last();
        }
        self.meta.written();
        self.subject.emit(value);
    }

    fn subscribe(&mut self) -> EntryStream<V> {
        self.meta.touch();
        self.subject.subscribe(!self.meta.is_stale())
    }

    fn listen(&mut self, sink: Sink<V>, replay: bool) -> Listener {
        self.subject.listen(sink, replay)
    }

    fn emit_error(&self, err: CacheError) {
        self.subject.emit_error(err);
    }

    fn has_listeners(&self) -> bool {
        self.subject.listener_count() > 0
    }

    fn dispose(&mut self) {
        self.subject.close();
    }
}
