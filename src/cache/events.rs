//! Write events and the in-memory queue they travel through.
//!
//! Events are only published once the write they describe has committed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::lock::mutex_lock;
use crate::domain::types::EntityType;

const SOURCE: &str = "cache::events";

pub const METRIC_CACHE_EVENT_QUEUE_LEN: &str = "timeledger_cache_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier, used to drop duplicates.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl WriteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteAction::Create => "create",
            WriteAction::Update => "update",
            WriteAction::Delete => "delete",
        }
    }

    pub fn event(self, entity: EntityType, id: Uuid) -> EventKind {
        match self {
            WriteAction::Create => EventKind::Created { entity, id },
            WriteAction::Update => EventKind::Updated { entity, id },
            WriteAction::Delete => EventKind::Deleted { entity, id },
        }
    }
}

/// A committed write to a cache-participating entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Created { entity: EntityType, id: Uuid },
    Updated { entity: EntityType, id: Uuid },
    Deleted { entity: EntityType, id: Uuid },
}

impl EventKind {
    pub fn entity(&self) -> EntityType {
        match self {
            EventKind::Created { entity, .. }
            | EventKind::Updated { entity, .. }
            | EventKind::Deleted { entity, .. } => *entity,
        }
    }

    pub fn record_id(&self) -> Uuid {
        match self {
            EventKind::Created { id, .. }
            | EventKind::Updated { id, .. }
            | EventKind::Deleted { id, .. } => *id,
        }
    }
}

/// FIFO queue drained by the cache consumer. Contention is low, so a mutex suffices.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind.clone(), epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_CACHE_EVENT_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let events = queue.drain(..count).collect();
        gauge!(METRIC_CACHE_EVENT_QUEUE_LEN).set(queue.len() as f64);
        events
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn updated(entity: EntityType) -> EventKind {
        WriteAction::Update.event(entity, Uuid::nil())
    }

    #[test]
    fn epoch_monotonicity() {
        let queue = EventQueue::new();
        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        assert!(e1 < e2);
    }

    #[test]
    fn publish_and_drain_in_fifo_order() {
        let queue = EventQueue::new();
        queue.publish(updated(EntityType::Project));
        queue.publish(updated(EntityType::TimeFrame));
        queue.publish(updated(EntityType::TimeEntry));

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(events[0].kind.entity(), EntityType::Project);
        assert_eq!(events[1].kind.entity(), EntityType::TimeFrame);
    }

    #[test]
    fn drain_more_than_available() {
        let queue = EventQueue::new();
        queue.publish(updated(EntityType::Preference));

        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn action_maps_to_event_kind() {
        let id = Uuid::new_v4();
        let kind = WriteAction::Delete.event(EntityType::TimeEntry, id);
        assert_eq!(
            kind,
            EventKind::Deleted {
                entity: EntityType::TimeEntry,
                id
            }
        );
        assert_eq!(kind.record_id(), id);
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(updated(EntityType::Project));
        assert_eq!(queue.len(), 1);
    }
}
