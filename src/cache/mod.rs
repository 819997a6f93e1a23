//! Timeledger result cache.
//!
//! Query results are memoized under keys derived from the canonical request
//! parameters and tagged by entity type (`Project`, `Projects`) and record
//! (`Project:{id}`). Writes publish events once committed; the consumer turns
//! them into a flush plan and evicts every entry carrying an affected tag.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 10000
//! default_ttl_seconds = 43200
//! # ... see config.rs for all options
//! ```

mod config;
mod consumer;
mod derived;
mod events;
mod keys;
mod lock;
mod memoizer;
mod planner;
mod registry;
mod store;
mod trigger;

use std::sync::Arc;

pub use config::CacheConfig;
pub use consumer::{CacheConsumer, METRIC_CACHE_CONSUME_MS};
pub use derived::{DerivedRegion, DerivedVariant};
pub use events::{
    CacheEvent, Epoch, EventKind, EventQueue, METRIC_CACHE_EVENT_QUEUE_LEN, WriteAction,
};
pub use keys::{
    CONTENT_ENTITIES, EntityClass, GLOBAL_ENTITIES, GLOBAL_PREFERENCES_KEY, cache_tags, hex_md5,
    item_cache_key, items_cache_key, model_cache_tags, record_tag,
};
pub use memoizer::{
    METRIC_CACHE_DEGRADED, METRIC_CACHE_FLUSH, METRIC_CACHE_HIT, METRIC_CACHE_MISS, Memoizer, Ttl,
};
pub use planner::FlushPlan;
pub use registry::TagRegistry;
pub use store::{CacheError, MemoryTagStore, TaggedStore};
pub use trigger::{CacheTrigger, PendingInvalidation};

/// The cache components a running application shares.
#[derive(Clone)]
pub struct CacheHandles {
    pub config: CacheConfig,
    pub memoizer: Arc<Memoizer>,
    pub trigger: Arc<CacheTrigger>,
    pub derived: Arc<DerivedRegion>,
}

impl CacheHandles {
    /// Wire every component on top of `store`.
    pub fn new(config: CacheConfig, store: Arc<dyn TaggedStore>) -> Self {
        let memoizer = Arc::new(Memoizer::new(store, &config));
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            memoizer.clone(),
            queue.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(config.clone(), queue, consumer));
        let derived = Arc::new(DerivedRegion::new(memoizer.clone(), config.derived_ttl()));

        Self {
            config,
            memoizer,
            trigger,
            derived,
        }
    }

    /// Process-local store bounded by `config.max_entries`.
    pub fn in_memory(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryTagStore::new(&config));
        Self::new(config, store)
    }
}
