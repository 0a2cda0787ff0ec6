//! Paged Module
//!
//! Caches of item lists composed over a shared per-item cache.

mod cache;
mod entry;

pub use cache::PagedCache;
pub use entry::{IdFn, PagedEntry};
