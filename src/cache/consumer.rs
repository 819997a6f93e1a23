//! Cache consumer: drains committed-write events and flushes their tags.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::{CacheEvent, EventQueue};
use super::memoizer::Memoizer;
use super::planner::FlushPlan;

pub const METRIC_CACHE_CONSUME_MS: &str = "timeledger_cache_consume_ms";

pub struct CacheConsumer {
    config: CacheConfig,
    memoizer: Arc<Memoizer>,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, memoizer: Arc<Memoizer>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            memoizer,
            queue,
        }
    }

    /// Drain one batch and flush the tags it implies.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return false;
        }

        self.apply(events).await;
        true
    }

    /// Flush the tags `events` imply, bypassing the queue.
    ///
    /// Returns the number of cache entries removed.
    #[instrument(skip_all)]
    pub async fn apply(&self, events: Vec<CacheEvent>) -> usize {
        let started_at = Instant::now();
        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = FlushPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let removed = if plan.is_empty() {
            0
        } else {
            self.memoizer.flush(&plan.tag_list()).await
        };

        info!(event_count, removed, "Cache consumption complete");

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        removed
    }

    /// Keep draining until the queue is empty.
    pub async fn consume_all(&self) -> usize {
        let mut batches = 0;
        while self.consume().await {
            batches += 1;
        }
        batches
    }
}
