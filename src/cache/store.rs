//! Cache Store Module
//!
//! File-backed cache engine: one JSON file per key under a root directory,
//! first write wins, bounded by an optional entry count and age.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, warn};

use crate::cache::{is_valid_key, CacheEntry, CacheStats, ENTRY_EXTENSION};
use crate::error::{Result, ServiceError};

// == Cache Policy ==
/// Bounds applied to a cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum number of entries kept, 0 = unbounded
    pub max_entries: usize,
    /// Entries older than this are discarded, None = never
    pub max_age: Option<Duration>,
}

impl CachePolicy {
    /// A policy that never evicts.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

// == Disk Cache ==
/// Content-addressed cache persisted as `<root>/<key>.json` files.
#[derive(Debug)]
pub struct DiskCache {
    /// Directory holding the entry files
    root: PathBuf,
    /// Eviction bounds
    policy: CachePolicy,
    /// Performance statistics
    stats: Mutex<CacheStats>,
    /// Suffix source for temporary files
    tmp_seq: AtomicU64,
}

impl DiskCache {
    // == Constructor ==
    /// Opens (creating if needed) a cache rooted at `root`.
    ///
    /// # Arguments
    /// * `root` - Directory holding the entry files
    /// * `policy` - Size and age bounds enforced by [`DiskCache::sweep`]
    pub async fn open(root: impl Into<PathBuf>, policy: CachePolicy) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            ServiceError::Storage(format!("cannot create {}: {}", root.display(), e))
        })?;

        Ok(Self {
            root,
            policy,
            stats: Mutex::new(CacheStats::new()),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns the file an entry for `key` lives in.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    fn checked_path(&self, key: &str) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(ServiceError::InvalidRequest(format!(
                "malformed cache key: {:?}",
                key
            )));
        }
        Ok(self.entry_path(key))
    }

    fn with_stats<T>(&self, f: impl FnOnce(&mut CacheStats) -> T) -> T {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats)
    }

    // == Get ==
    /// Looks up the entry for `key`.
    ///
    /// Unreadable or expired entries are removed and reported as misses.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.checked_path(key)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.with_stats(|s| s.record_miss());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                self.discard(&path).await;
                self.with_stats(|s| s.record_miss());
                return Ok(None);
            }
        };

        if let Some(max_age) = self.policy.max_age {
            if entry.age().to_std().unwrap_or_default() > max_age {
                debug!(key, "cache entry expired");
                if self.discard(&path).await {
                    self.with_stats(|s| s.record_evictions(1));
                }
                self.with_stats(|s| s.record_miss());
                return Ok(None);
            }
        }

        self.with_stats(|s| s.record_hit());
        Ok(Some(entry))
    }

    // == Put ==
    /// Persists `entry` under `key` unless an entry already exists.
    ///
    /// Returns `true` when the entry was written. The file is written to a
    /// temporary name and renamed into place, so readers never observe a
    /// partial entry.
    pub async fn put(&self, key: &str, entry: &CacheEntry) -> Result<bool> {
        let path = self.checked_path(key)?;

        if fs::try_exists(&path).await? {
            debug!(key, "cache entry already present, keeping first write");
            return Ok(false);
        }

        let bytes = serde_json::to_vec_pretty(entry)
            .map_err(|e| ServiceError::Storage(format!("cannot serialize entry: {}", e)))?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!("{}.{}-{}.tmp", key, std::process::id(), seq));

        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.with_stats(|s| s.record_write());
        debug!(key, bytes = bytes.len(), "cache entry written");
        Ok(true)
    }

    // == Remove ==
    /// Deletes the entry for `key`, returning whether one was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.checked_path(key)?;
        let removed = self.discard(&path).await;
        if removed {
            debug!(key, "cache entry removed");
        }
        Ok(removed)
    }

    async fn discard(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove cache file");
                false
            }
        }
    }

    /// Lists entry files with their modification times.
    async fn list_entries(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let modified = match item.metadata().await {
                Ok(meta) => meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                // Removed between listing and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push((path, modified));
        }

        Ok(entries)
    }

    // == Length ==
    /// Returns the number of entries on disk.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.list_entries().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    // == Sweep ==
    /// Enforces the cache policy: drops entries older than `max_age`, then
    /// the oldest entries beyond `max_entries`.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut victims = Vec::new();
        let mut kept = Vec::new();

        for (path, modified) in self.list_entries().await? {
            let age = now.duration_since(modified).unwrap_or_default();
            match self.policy.max_age {
                Some(max_age) if age > max_age => victims.push(path),
                _ => kept.push((path, modified)),
            }
        }

        let max_entries = self.policy.max_entries;
        if max_entries > 0 && kept.len() > max_entries {
            kept.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let excess = kept.len() - max_entries;
            victims.extend(kept.drain(..excess).map(|(path, _)| path));
        }

        let mut removed = 0;
        for path in victims {
            if self.discard(&path).await {
                removed += 1;
            }
        }

        self.with_stats(|s| {
            s.record_evictions(removed);
            s.set_total_entries(kept.len());
        });
        Ok(removed)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> Result<CacheStats> {
        let total = self.len().await?;
        Ok(self.with_stats(|s| {
            s.set_total_entries(total);
            s.clone()
        }))
    }
}
