//! Cache configuration.
//!
//! Controls the tagged result cache and its invalidation consumer via the
//! `[cache]` section of `timeledger.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::memoizer::Ttl;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Twelve hours.
const DEFAULT_TTL_SECONDS: i64 = 43_200;
const DEFAULT_DERIVED_TTL_SECONDS: i64 = 43_200;
/// One day.
const DEFAULT_PREFERENCE_TTL_SECONDS: i64 = 86_400;
const DEFAULT_AUTO_CONSUME_INTERVAL_MS: u64 = 5000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

/// Cache configuration. Any negative TTL means "keep until flushed".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store results through the cache.
    pub enabled: bool,
    /// Maximum entries held by the in-memory store before LRU eviction.
    pub max_entries: usize,
    /// TTL for collection and single-resource results.
    pub default_ttl_seconds: i64,
    /// TTL for the derived-field region.
    pub derived_ttl_seconds: i64,
    /// TTL for the cached global preference record.
    pub preference_ttl_seconds: i64,
    /// Safety-net interval for draining events nobody consumed inline.
    pub auto_consume_interval_ms: u64,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            derived_ttl_seconds: DEFAULT_DERIVED_TTL_SECONDS,
            preference_ttl_seconds: DEFAULT_PREFERENCE_TTL_SECONDS,
            auto_consume_interval_ms: DEFAULT_AUTO_CONSUME_INTERVAL_MS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries,
            default_ttl_seconds: settings.default_ttl_seconds,
            derived_ttl_seconds: settings.derived_ttl_seconds,
            preference_ttl_seconds: settings.preference_ttl_seconds,
            auto_consume_interval_ms: settings.auto_consume_interval_ms,
            consume_batch_limit: settings.consume_batch_limit,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn default_ttl(&self) -> Ttl {
        Ttl::from_seconds(self.default_ttl_seconds)
    }

    pub fn derived_ttl(&self) -> Ttl {
        Ttl::from_seconds(self.derived_ttl_seconds)
    }

    pub fn preference_ttl(&self) -> Ttl {
        Ttl::from_seconds(self.preference_ttl_seconds)
    }
}
