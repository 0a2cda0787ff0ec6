//! Trim Task
//!
//! Background task that periodically runs an eviction pass, so stale orphaned
//! entries are reclaimed even when no new entries are being created.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Trim;

/// Spawns a background task that trims `cache` every `interval_secs` seconds.
///
/// # Arguments
/// * `cache` - Any cache handle implementing [`Trim`]
/// * `interval_secs` - Interval in seconds between passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache: KeyedCache<u32, String> = KeyedCache::new(CacheConfig::default());
/// let trim_handle = spawn_trim_task(cache.clone(), 30);
/// // Later, during shutdown:
/// trim_handle.abort();
/// ```
pub fn spawn_trim_task<C: Trim>(cache: C, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting cache trim task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.trim();
            if removed > 0 {
                info!("Cache trim: removed {} entries", removed);
            } else {
                debug!("Cache trim: nothing to remove");
            }
        }
    })
}
