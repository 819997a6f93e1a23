//! Tagged cache storage.
//!
//! [`TaggedStore`] is the seam between the memoizer and whatever backend
//! holds the bytes. [`MemoryTagStore`] is the in-process implementation: an
//! LRU map with lazy TTL expiry and a [`TagRegistry`] index.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};
use super::registry::TagRegistry;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

/// Key/value store whose entries can be evicted in bulk by tag.
#[async_trait]
pub trait TaggedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key`. `None` TTL keeps the entry until flushed or evicted.
    async fn put(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Remove every entry carrying any of `tags`. Returns the number removed.
    async fn flush_tags(&self, tags: &[String]) -> Result<usize, CacheError>;

    /// Counter bumped by every flush.
    async fn flush_epoch(&self) -> Result<u64, CacheError>;

    /// Store `value` only if no flush has run since `epoch` was read.
    ///
    /// The check and the write must be atomic with respect to
    /// [`flush_tags`](Self::flush_tags). Returns whether the value was stored.
    async fn put_unless_flushed(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
        epoch: u64,
    ) -> Result<bool, CacheError>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process tagged store.
///
/// The entry map lock is held for the whole of a put or flush, so readers
/// observe either the complete entry or a clean miss. The registry and the
/// flush epoch are only written while that lock is held.
pub struct MemoryTagStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
    registry: TagRegistry,
    epoch: AtomicU64,
}

impl MemoryTagStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            registry: TagRegistry::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Number of distinct tags currently indexed.
    pub fn tag_count(&self) -> usize {
        self.registry.tag_count()
    }

    fn insert(
        &self,
        entries: &mut LruCache<String, StoredEntry>,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
    ) {
        if let Some((evicted, _)) = entries.push(key.to_string(), StoredEntry::new(value, ttl))
            && evicted != key
        {
            self.registry.unregister(&evicted);
        }
        self.registry.register(key, tags);
    }
}

#[async_trait]
impl TaggedStore for MemoryTagStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            self.registry.unregister(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "put");
        self.insert(&mut entries, key, tags, value, ttl);
        Ok(())
    }

    async fn flush_tags(&self, tags: &[String]) -> Result<usize, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "flush_tags");
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let keys = self.registry.keys_for_tags(tags);
        let mut removed = 0;
        for key in &keys {
            if entries.pop(key).is_some() {
                removed += 1;
            }
            self.registry.unregister(key);
        }
        Ok(removed)
    }

    async fn flush_epoch(&self) -> Result<u64, CacheError> {
        Ok(self.epoch.load(Ordering::Acquire))
    }

    async fn put_unless_flushed(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
        epoch: u64,
    ) -> Result<bool, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "put_unless_flushed");
        if self.epoch.load(Ordering::Acquire) != epoch {
            return Ok(false);
        }
        self.insert(&mut entries, key, tags, value, ttl);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_entries: usize) -> MemoryTagStore {
        MemoryTagStore::new(&CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes() {
        let store = store(10);
        store
            .put("Project:1", &tags(&["Project"]), Bytes::from_static(b"{}"), None)
            .await
            .unwrap();
        assert_eq!(
            store.get("Project:1").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
    }

    #[tokio::test]
    async fn flush_removes_only_tagged_entries() {
        let store = store(10);
        store
            .put("Projects:a", &tags(&["Project", "Projects"]), Bytes::new(), None)
            .await
            .unwrap();
        store
            .put("TimeEntrys:b", &tags(&["TimeEntry", "TimeEntrys"]), Bytes::new(), None)
            .await
            .unwrap();

        let removed = store.flush_tags(&tags(&["Project"])).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.contains("Projects:a"));
        assert!(store.contains("TimeEntrys:b"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let store = store(10);
        store
            .put("k", &tags(&["Project"]), Bytes::new(), Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
        assert_eq!(store.tag_count(), 0);
    }

    #[tokio::test]
    async fn eviction_forgets_tags_of_the_evicted_key() {
        let store = store(1);
        store
            .put("a", &tags(&["Project"]), Bytes::new(), None)
            .await
            .unwrap();
        store
            .put("b", &tags(&["TimeFrame"]), Bytes::new(), None)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.flush_tags(&tags(&["Project"])).await.unwrap(), 0);
        assert!(store.contains("b"));
    }

    #[tokio::test]
    async fn put_after_a_flush_is_refused() {
        let store = store(10);
        let epoch = store.flush_epoch().await.unwrap();

        store.flush_tags(&tags(&["TimeFrame"])).await.unwrap();
        let stored = store
            .put_unless_flushed("TimeFrame:1", &tags(&["TimeFrame"]), Bytes::new(), None, epoch)
            .await
            .unwrap();

        assert!(!stored);
        assert!(!store.contains("TimeFrame:1"));
        assert_eq!(store.tag_count(), 0);

        let epoch = store.flush_epoch().await.unwrap();
        assert!(
            store
                .put_unless_flushed("TimeFrame:1", &tags(&["TimeFrame"]), Bytes::new(), None, epoch)
                .await
                .unwrap()
        );
        assert!(store.contains("TimeFrame:1"));
    }
}
