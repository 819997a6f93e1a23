//! Flush plan generation.
//!
//! Merges a batch of write events into the set of tags to flush.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::CacheEvent;
use super::keys::{model_cache_tags, record_tag};
use crate::domain::types::EntityType;

#[derive(Debug, Default)]
pub struct FlushPlan {
    /// Entity types written in this batch.
    pub written: BTreeSet<EntityType>,
    /// Tags to flush, deduplicated across events.
    pub tags: BTreeSet<String>,
}

impl fmt::Display for FlushPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let written: Vec<&str> = self.written.iter().map(|entity| entity.as_str()).collect();
        write!(
            f,
            "FlushPlan {{ written: [{}], tags: {} }}",
            written.join(", "),
            self.tags.len()
        )
    }
}

impl FlushPlan {
    /// Deduplicates by event id, then expands each write into its tag set.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            let entity = event.kind.entity();
            plan.written.insert(entity);
            for affected in model_cache_tags(entity) {
                plan.tags.insert(affected.as_str().to_string());
                plan.tags.insert(affected.plural().to_string());
            }
            plan.tags
                .insert(record_tag(entity, &event.kind.record_id().to_string()));
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }
}
