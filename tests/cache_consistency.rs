use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use timeledger::application::filter::{QueryParams, spec_for};
use timeledger::application::services::query_tags;
use timeledger::cache::{
    CacheConfig, CacheError, CacheHandles, Memoizer, MemoryTagStore, TaggedStore, Ttl,
    WriteAction, cache_tags, items_cache_key,
};
use timeledger::domain::types::EntityType;

struct Tally {
    computed: AtomicUsize,
}

impl Tally {
    fn new() -> Self {
        Self {
            computed: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.computed.load(Ordering::SeqCst)
    }

    async fn remember(&self, memoizer: &Memoizer, key: &str, tags: &[String]) -> usize {
        memoizer
            .remember(key, tags, Ttl::Forever, || async {
                Ok::<_, Infallible>(self.computed.fetch_add(1, Ordering::SeqCst))
            })
            .await
            .unwrap()
    }
}

fn collection_key(entity: EntityType) -> (String, Vec<String>) {
    let query = spec_for(entity).translate(&QueryParams::new());
    (items_cache_key(entity, &query.params), query_tags(&query, None))
}

#[tokio::test]
async fn content_write_only_evicts_its_own_type() {
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let projects = Tally::new();
    let entries = Tally::new();
    let (project_key, project_tags) = collection_key(EntityType::Project);
    let (entry_key, entry_tags) = collection_key(EntityType::TimeEntry);

    projects.remember(&cache.memoizer, &project_key, &project_tags).await;
    entries.remember(&cache.memoizer, &entry_key, &entry_tags).await;

    cache
        .trigger
        .begin(EntityType::TimeEntry, WriteAction::Update)
        .commit(Uuid::new_v4())
        .await;

    projects.remember(&cache.memoizer, &project_key, &project_tags).await;
    entries.remember(&cache.memoizer, &entry_key, &entry_tags).await;

    assert_eq!(projects.count(), 1);
    assert_eq!(entries.count(), 2);
}

#[tokio::test]
async fn results_reading_through_a_relation_follow_its_writes() {
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let tally = Tally::new();
    let query =
        spec_for(EntityType::Project).translate(&QueryParams::parse("include=timeEntries"));
    let key = items_cache_key(EntityType::Project, &query.params);
    let tags = query_tags(&query, None);

    tally.remember(&cache.memoizer, &key, &tags).await;
    cache
        .trigger
        .begin(EntityType::TimeEntry, WriteAction::Create)
        .commit(Uuid::new_v4())
        .await;
    tally.remember(&cache.memoizer, &key, &tags).await;

    assert_eq!(tally.count(), 2);
}

#[tokio::test]
async fn preference_write_evicts_everything() {
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let tallies: Vec<(Tally, String, Vec<String>)> = [
        EntityType::Project,
        EntityType::TimeFrame,
        EntityType::TimeEntry,
        EntityType::Preference,
    ]
    .into_iter()
    .map(|entity| {
        let (key, tags) = collection_key(entity);
        (Tally::new(), key, tags)
    })
    .collect();

    for (tally, key, tags) in &tallies {
        tally.remember(&cache.memoizer, key, tags).await;
    }
    cache
        .trigger
        .begin(EntityType::Preference, WriteAction::Update)
        .commit(Uuid::new_v4())
        .await;
    for (tally, key, tags) in &tallies {
        tally.remember(&cache.memoizer, key, tags).await;
    }

    for (tally, key, _) in &tallies {
        assert_eq!(tally.count(), 2, "{key} survived a preference write");
    }
}

#[tokio::test]
async fn uncommitted_write_keeps_cached_results() {
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let tally = Tally::new();
    let tags = cache_tags(EntityType::TimeFrame, Some("7"));

    tally.remember(&cache.memoizer, "TimeFrame:7", &tags).await;
    {
        let _pending = cache
            .trigger
            .begin(EntityType::TimeFrame, WriteAction::Delete);
    }
    tally.remember(&cache.memoizer, "TimeFrame:7", &tags).await;

    assert_eq!(tally.count(), 1);
    assert!(cache.trigger.queue().is_empty());
}

#[tokio::test]
async fn disabled_cache_always_computes() {
    let cache = CacheHandles::in_memory(CacheConfig {
        enabled: false,
        ..Default::default()
    });
    let tally = Tally::new();
    let (key, tags) = collection_key(EntityType::Project);

    tally.remember(&cache.memoizer, &key, &tags).await;
    tally.remember(&cache.memoizer, &key, &tags).await;

    assert_eq!(tally.count(), 2);
}

struct UnreachableStore;

#[async_trait]
impl TaggedStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn put(
        &self,
        _key: &str,
        _tags: &[String],
        _value: Bytes,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn flush_tags(&self, _tags: &[String]) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn flush_epoch(&self) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn put_unless_flushed(
        &self,
        _key: &str,
        _tags: &[String],
        _value: Bytes,
        _ttl: Option<Duration>,
        _epoch: u64,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn unreachable_store_degrades_to_direct_computation() {
    let config = CacheConfig::default();
    let cache = CacheHandles::new(config, Arc::new(UnreachableStore));
    let tally = Tally::new();
    let (key, tags) = collection_key(EntityType::Project);

    assert_eq!(tally.remember(&cache.memoizer, &key, &tags).await, 0);
    assert_eq!(tally.remember(&cache.memoizer, &key, &tags).await, 1);
    assert_eq!(cache.memoizer.flush(&tags).await, 0);
}

#[tokio::test]
async fn computation_errors_are_not_cached() {
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let attempts = AtomicUsize::new(0);

    for _ in 0..2 {
        let result: Result<u32, &str> = cache
            .memoizer
            .remember("Projects:x", &[], Ttl::Forever, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("storage down")
            })
            .await;
        assert_eq!(result, Err("storage down"));
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// Runs a flush for the entry's tags right before every conditional store.
struct FlushBeforeStore {
    inner: MemoryTagStore,
}

#[async_trait]
impl TaggedStore for FlushBeforeStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.inner.put(key, tags, value, ttl).await
    }

    async fn flush_tags(&self, tags: &[String]) -> Result<usize, CacheError> {
        self.inner.flush_tags(tags).await
    }

    async fn flush_epoch(&self) -> Result<u64, CacheError> {
        self.inner.flush_epoch().await
    }

    async fn put_unless_flushed(
        &self,
        key: &str,
        tags: &[String],
        value: Bytes,
        ttl: Option<Duration>,
        epoch: u64,
    ) -> Result<bool, CacheError> {
        self.inner.flush_tags(tags).await?;
        self.inner
            .put_unless_flushed(key, tags, value, ttl, epoch)
            .await
    }
}

#[tokio::test]
async fn value_loaded_before_a_flush_is_not_stored_after_it() {
    let config = CacheConfig::default();
    let memoizer = Memoizer::new(
        Arc::new(FlushBeforeStore {
            inner: MemoryTagStore::new(&config),
        }),
        &config,
    );
    let (key, tags) = collection_key(EntityType::TimeFrame);

    let first: Result<String, Infallible> = memoizer
        .remember(&key, &tags, Ttl::Forever, || async { Ok("old".to_string()) })
        .await;
    assert_eq!(first.unwrap(), "old");

    let second: Result<String, Infallible> = memoizer
        .remember(&key, &tags, Ttl::Forever, || async { Ok("new".to_string()) })
        .await;
    assert_eq!(second.unwrap(), "new");
}

#[tokio::test]
async fn commit_flushes_its_own_tags_behind_a_full_queue() {
    let cache = CacheHandles::in_memory(CacheConfig {
        consume_batch_limit: 2,
        ..Default::default()
    });
    for _ in 0..3 {
        cache
            .trigger
            .trigger(WriteAction::Update.event(EntityType::Project, Uuid::new_v4()), false)
            .await;
    }
    let tally = Tally::new();
    let (key, tags) = collection_key(EntityType::TimeFrame);
    tally.remember(&cache.memoizer, &key, &tags).await;

    cache
        .trigger
        .begin(EntityType::TimeFrame, WriteAction::Update)
        .commit(Uuid::new_v4())
        .await;

    assert_eq!(tally.remember(&cache.memoizer, &key, &tags).await, 1);
    assert_eq!(cache.trigger.queue().len(), 1);
}
