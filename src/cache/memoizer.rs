//! Remember-with-tags on top of a [`TaggedStore`].
//!
//! The store is an optimisation. Any failure talking to it, or decoding what
//! it returns, is logged and counted, and the caller's computation runs as if
//! the cache were absent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::store::{CacheError, TaggedStore};

pub const METRIC_CACHE_HIT: &str = "timeledger_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "timeledger_cache_miss_total";
pub const METRIC_CACHE_DEGRADED: &str = "timeledger_cache_degraded_total";
pub const METRIC_CACHE_FLUSH: &str = "timeledger_cache_flush_total";

/// Lifetime of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    For(Duration),
    /// Kept until a tag flush or LRU eviction removes it.
    Forever,
}

impl Ttl {
    /// Negative seconds (conventionally `-1`) mean [`Ttl::Forever`].
    pub fn from_seconds(seconds: i64) -> Self {
        match u64::try_from(seconds) {
            Ok(seconds) => Ttl::For(Duration::from_secs(seconds)),
            Err(_) => Ttl::Forever,
        }
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Ttl::For(duration) => Some(duration),
            Ttl::Forever => None,
        }
    }
}

/// A value computed across a flush is returned but not stored.
pub struct Memoizer {
    store: Arc<dyn TaggedStore>,
    enabled: bool,
}

impl Memoizer {
    pub fn new(store: Arc<dyn TaggedStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.is_enabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached value for `key`, or run `compute` and cache its result.
    ///
    /// Errors from `compute` propagate unchanged and are never cached.
    pub async fn remember<T, F, Fut, E>(
        &self,
        key: &str,
        tags: &[String],
        ttl: Ttl,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return compute().await;
        }

        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    self.degraded(key, "decode", &CacheError::Serialization(err.to_string()))
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(key, "Cache miss");
            }
            Err(err) => self.degraded(key, "get", &err),
        }

        let epoch = match self.store.flush_epoch().await {
            Ok(epoch) => epoch,
            Err(err) => {
                self.degraded(key, "epoch", &err);
                return compute().await;
            }
        };
        let value = compute().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                match self
                    .store
                    .put_unless_flushed(key, tags, Bytes::from(bytes), ttl.as_duration(), epoch)
                    .await
                {
                    Ok(true) => debug!(key, tags = ?tags, ?ttl, "Cache stored"),
                    Ok(false) => debug!(key, "Cache store skipped: flushed while computing"),
                    Err(err) => self.degraded(key, "put", &err),
                }
            }
            Err(err) => self.degraded(key, "encode", &CacheError::Serialization(err.to_string())),
        }

        Ok(value)
    }

    /// Evict every entry carrying any of `tags`. Never fails.
    pub async fn flush(&self, tags: &[String]) -> usize {
        match self.store.flush_tags(tags).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_FLUSH).increment(1);
                info!(tags = ?tags, removed, "Cache tags flushed");
                removed
            }
            Err(err) => {
                self.degraded("-", "flush", &err);
                0
            }
        }
    }

    fn degraded(&self, key: &str, op: &'static str, err: &CacheError) {
        counter!(METRIC_CACHE_DEGRADED, "op" => op).increment(1);
        warn!(
            key,
            op,
            error = %err,
            "Cache unavailable, falling back to direct computation"
        );
    }
}
