//! Reactive Cache - A bounded, time-aware, observable keyed cache
//!
//! Provides LRU + TTL eviction of unobserved entries, live per-key streams,
//! optimistic updates with rollback, and paged caches that compose lists out
//! of a shared per-item cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod paged;
pub mod stream;
pub mod tasks;

pub use cache::{CacheStats, KeyedCache, StreamOptions};
pub use config::{CacheConfig, Config, PagedConfig};
pub use error::{CacheError, Result};
pub use paged::PagedCache;
pub use stream::EntryStream;
pub use tasks::spawn_trim_task;
