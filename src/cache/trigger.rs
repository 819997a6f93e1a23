//! Post-commit cache invalidation.
//!
//! A write path calls [`CacheTrigger::begin`] before touching storage and
//! [`PendingInvalidation::commit`] once the write has committed. Until then
//! nothing is flushed; a pending invalidation dropped without commit (the
//! write failed or rolled back) flushes nothing either.
//!
//! A commit flushes its own tags before returning, whatever else is waiting
//! in the queue, so the writer's next read already misses.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{CacheEvent, EventKind, EventQueue, WriteAction};
use crate::domain::types::EntityType;

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume it immediately.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    /// Flush a committed write's tags now, then drain one batch of older events.
    async fn flush_committed(&self, kind: EventKind) {
        if !self.config.is_enabled() {
            debug!(event_kind = ?kind, "Cache flush skipped: cache disabled");
            return;
        }

        let event = CacheEvent::new(kind, self.queue.next_epoch());
        self.consumer.apply(vec![event]).await;
        self.consumer.consume().await;
    }

    /// Open the pending state for a write about to run.
    pub fn begin(&self, entity: EntityType, action: WriteAction) -> PendingInvalidation<'_> {
        PendingInvalidation {
            trigger: self,
            entity,
            action,
            committed: false,
        }
    }

    pub async fn entity_created(&self, entity: EntityType, id: Uuid) {
        self.trigger(WriteAction::Create.event(entity, id), true).await;
    }

    pub async fn entity_updated(&self, entity: EntityType, id: Uuid) {
        self.trigger(WriteAction::Update.event(entity, id), true).await;
    }

    pub async fn entity_deleted(&self, entity: EntityType, id: Uuid) {
        self.trigger(WriteAction::Delete.event(entity, id), true).await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer> {
        &self.consumer
    }
}

/// A write that has started but not yet committed.
#[must_use = "call `commit` after the write succeeds"]
pub struct PendingInvalidation<'a> {
    trigger: &'a CacheTrigger,
    entity: EntityType,
    action: WriteAction,
    committed: bool,
}

impl PendingInvalidation<'_> {
    /// Transition to committed and flush the written entity's tags.
    pub async fn commit(mut self, id: Uuid) {
        self.committed = true;
        self.trigger
            .flush_committed(self.action.event(self.entity, id))
            .await;
    }
}

impl Drop for PendingInvalidation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                entity = %self.entity,
                action = self.action.as_str(),
                "Pending cache invalidation discarded: write did not commit"
            );
        }
    }
}
