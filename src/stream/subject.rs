//! Replay Subject Module
//!
//! Multi-subscriber broadcast with a retained last-value slot.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::CacheError;

// == Event ==
/// A single notification delivered to a sink.
#[derive(Debug, Clone)]
pub enum Event<T> {
    Value(T),
    Error(CacheError),
}

/// Callback invoked synchronously for every event a subject emits.
pub type Sink<T> = Arc<dyn Fn(&Event<T>) + Send + Sync>;

// == Listener ==
/// Guard for one attached sink. Dropping it detaches the sink.
#[must_use = "dropping a Listener detaches it immediately"]
pub struct Listener {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Listener {
    pub(crate) fn detached() -> Self {
        Self { detach: None }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// == Subject ==
struct SubjectState<T> {
    last: Option<T>,
    sinks: Vec<(u64, Sink<T>)>,
    next_id: u64,
}

/// Broadcast channel that remembers the last emitted value.
///
/// Emission is synchronous: sinks run on the caller's thread after the
/// internal lock has been released, in attachment order.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                last: None,
                sinks: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl<T> Subject<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the retained value.
    pub fn last(&self) -> Option<T> {
        self.state.lock().last.clone()
    }

    /// Clears and returns the retained value without notifying anyone.
    pub fn take_last(&self) -> Option<T> {
        self.state.lock().last.take()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    // == Emit ==
    /// Stores `value` and forwards it to every sink.
    ///
    /// Returns `false` without notifying when `value` equals the retained value.
    pub fn emit(&self, value: T) -> bool {
        let sinks = {
            let mut state = self.state.lock();
            if state.last.as_ref() == Some(&value) {
                return false;
            }
            state.last = Some(value.clone());
            state.snapshot()
        };
        let event = Event::Value(value);
        for sink in sinks {
            sink(&event);
        }
        true
    }

    /// Forwards an error to every sink. The retained value is left untouched.
    pub fn emit_error(&self, err: CacheError) {
        let sinks = self.state.lock().snapshot();
        let event = Event::Error(err);
        for sink in sinks {
            sink(&event);
        }
    }

    // == Listen ==
    /// Attaches a sink. With `replay`, the retained value is delivered at once.
    pub fn listen(&self, sink: Sink<T>, replay: bool) -> Listener {
        let (id, current) = {
            let mut state = self.state.lock();
            let id = state.attach(Arc::clone(&sink));
            (id, if replay { state.last.clone() } else { None })
        };
        if let Some(value) = current {
            sink(&Event::Value(value));
        }
        self.listener_for(id)
    }

    // == Subscribe ==
    /// Opens a new stream. With `replay`, the retained value is its first item.
    pub fn subscribe(&self, replay: bool) -> EntryStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock();
            if replay {
                if let Some(value) = state.last.clone() {
                    let _ = tx.send(Ok(value));
                }
            }
            let sink: Sink<T> = Arc::new(move |event: &Event<T>| {
                let item = match event {
                    Event::Value(value) => Ok(value.clone()),
                    Event::Error(err) => Err(err.clone()),
                };
                // Receiver gone means the subscriber is detaching
                let _ = tx.send(item);
            });
            state.attach(sink)
        };
        EntryStream {
            rx,
            _listener: self.listener_for(id),
        }
    }

    /// Detaches every sink and drops the retained value. Open streams end.
    pub fn close(&self) {
        let sinks = {
            let mut state = self.state.lock();
            state.last = None;
            std::mem::take(&mut state.sinks)
        };
        // Dropped outside the lock: sinks may own other listeners
        drop(sinks);
    }

    fn listener_for(&self, id: u64) -> Listener {
        let weak: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&self.state);
        Listener {
            detach: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    let removed = {
                        let mut state = state.lock();
                        let index = state.sinks.iter().position(|(sink_id, _)| *sink_id == id);
                        index.map(|index| state.sinks.remove(index))
                    };
                    drop(removed);
                }
            })),
        }
    }
}

impl<T> SubjectState<T> {
    fn attach(&mut self, sink: Sink<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.sinks.push((id, sink));
        id
    }

    fn snapshot(&self) -> Vec<Sink<T>> {
        self.sinks.iter().map(|(_, sink)| Arc::clone(sink)).collect()
    }
}

// == Entry Stream ==
/// Live subscription to one cache entry.
///
/// Yields `Ok(value)` for every value transition and `Err` for loader failures.
/// Ends when the entry is removed, evicted or the cache is disposed. Dropping
/// the stream cancels the subscription immediately.
pub struct EntryStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T, CacheError>>,
    _listener: Listener,
}

impl<T> EntryStream<T> {
    /// A stream that has already ended.
    pub fn closed() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            _listener: Listener::detached(),
        }
    }
}

impl<T> Stream for EntryStream<T> {
    type Item = Result<T, CacheError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for EntryStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream").finish_non_exhaustive()
    }
}
