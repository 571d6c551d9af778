use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::version::semver::VersionKey;

struct CacheEntry {
    versions: Vec<String>,
    stored_at: Instant,
}

/// In-memory cache for one sorted version list (available or installed)
///
/// Populated lazily by the manager. Without a TTL an entry lives until
/// `invalidate` is called; with a TTL it is treated as absent once older
/// than the TTL.
pub struct ListCache {
    name: &'static str,
    entry: RwLock<Option<CacheEntry>>,
    ttl: Option<Duration>,
}

impl ListCache {
    pub fn new(name: &'static str, ttl: Option<Duration>) -> Self {
        Self {
            name,
            entry: RwLock::new(None),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<CacheEntry>> {
        self.entry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<CacheEntry>> {
        self.entry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_none_or(|ttl| entry.stored_at.elapsed() < ttl)
    }

    /// Cached versions, or None when empty or expired
    pub fn get(&self) -> Option<Vec<String>> {
        let guard = self.read();
        let entry = guard.as_ref()?;
        if self.is_fresh(entry) {
            debug!("{} cache hit ({} versions)", self.name, entry.versions.len());
            Some(entry.versions.clone())
        } else {
            debug!("{} cache expired", self.name);
            None
        }
    }

    pub fn store(&self, versions: Vec<String>) {
        *self.write() = Some(CacheEntry {
            versions,
            stored_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        debug!("Invalidating {} cache", self.name);
        *self.write() = None;
    }

    /// Add `version` to a populated cache, keeping it sorted by `key`
    ///
    /// An empty cache stays empty: the next read lists from the source.
    pub fn insert_sorted<F>(&self, version: &str, key: F)
    where
        F: Fn(&str) -> VersionKey,
    {
        let mut guard = self.write();
        let Some(entry) = guard.as_mut() else {
            return;
        };
        if entry.versions.iter().any(|v| v == version) {
            return;
        }
        let new_key = key(version);
        let pos = entry
            .versions
            .iter()
            .position(|v| key(v) > new_key)
            .unwrap_or(entry.versions.len());
        entry.versions.insert(pos, version.to_string());
    }

    pub fn remove(&self, version: &str) {
        if let Some(entry) = self.write().as_mut() {
            entry.versions.retain(|v| v != version);
        }
    }
}
