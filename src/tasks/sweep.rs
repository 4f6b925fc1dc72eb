//! Cache Sweep Task
//!
//! Background task that periodically evicts cache entries beyond the
//! configured size and age bounds.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::DiskCache;

/// Sweeps every cache once, returning the total number of evicted entries.
///
/// A failing cache is logged and skipped.
pub async fn sweep_all(caches: &[Arc<DiskCache>]) -> usize {
    let mut total = 0;
    for cache in caches {
        match cache.sweep().await {
            Ok(removed) => {
                if removed > 0 {
                    info!(root = %cache.root().display(), removed, "cache sweep evicted entries");
                }
                total += removed;
            }
            Err(e) => warn!(root = %cache.root().display(), error = %e, "cache sweep failed"),
        }
    }
    total
}

/// Spawns a background task that sweeps the caches at a fixed interval.
///
/// The first sweep runs immediately.
///
/// # Arguments
/// * `caches` - Caches to keep within their policy
/// * `interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_sweep_task(caches: Vec<Arc<DiskCache>>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {} seconds", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = sweep_all(&caches).await;
            if removed == 0 {
                debug!("Cache sweep: nothing to evict");
            }
        }
    })
}
