//! Combine-Latest Module
//!
//! Fan-in of N sources into an ordered list that is re-derived whenever any
//! source emits.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::{Event, Sink, Subject};

struct Latest<T> {
    values: Vec<Option<T>>,
    missing: usize,
}

/// Holds the latest value of every source and publishes the full list to an
/// output subject.
///
/// Nothing is published until every source has produced at least one value.
/// Errors from any source are forwarded as they arrive.
pub struct CombineLatest<T> {
    latest: Mutex<Latest<T>>,
    output: Subject<Vec<T>>,
}

impl<T> CombineLatest<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(sources: usize, output: Subject<Vec<T>>) -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(Latest {
                values: vec![None; sources],
                missing: sources,
            }),
            output,
        })
    }

    /// Sink feeding the source at `index`.
    pub fn sink(self: &Arc<Self>, index: usize) -> Sink<T> {
        let combiner = Arc::clone(self);
        Arc::new(move |event: &Event<T>| combiner.on_event(index, event))
    }

    fn on_event(&self, index: usize, event: &Event<T>) {
        match event {
            Event::Value(value) => {
                let combined = {
                    let mut latest = self.latest.lock();
                    let Some(slot) = latest.values.get_mut(index) else {
                        return;
                    };
                    if slot.replace(value.clone()).is_none() {
                        latest.missing -= 1;
                    }
                    if latest.missing > 0 {
                        return;
                    }
                    latest.values.iter().flatten().cloned().collect::<Vec<_>>()
                };
                self.output.emit(combined);
            }
            Event::Error(err) => self.output.emit_error(err.clone()),
        }
    }
}
