//! Stream Module
//!
//! Reactive primitives backing cache subscriptions.

mod combine;
mod subject;

pub use combine::CombineLatest;
pub use subject::{EntryStream, Event, Listener, Sink, Subject};
