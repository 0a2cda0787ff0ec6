//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Trim: evicts stale and overflowing orphaned entries at a fixed interval

mod trim;

pub use trim::spawn_trim_task;
