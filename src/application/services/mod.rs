//! Entity services.
//!
//! Each service translates the raw parameter map through its entity's
//! filter spec, memoizes reads under keys built from the recognised
//! parameters, and schedules tag invalidation once a write has committed.

mod preferences;
mod projects;
mod time_entries;
mod time_frames;
pub mod validation;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use preferences::{PreferenceInput, PreferenceService};
pub use projects::{ProjectInput, ProjectService};
pub use time_entries::{TimeEntryInput, TimeEntryService};
pub use time_frames::{
    RELOAD_QUERY as TIME_FRAME_RELOAD_QUERY, TimeFrameInput, TimeFrameService,
};

use crate::application::error::ServiceError;
use crate::application::filter::TranslatedQuery;
use crate::cache::{
    CacheHandles, CacheTrigger, Memoizer, PendingInvalidation, Ttl, WriteAction, cache_tags,
    item_cache_key, items_cache_key,
};
use crate::domain::types::EntityType;

/// Memoized reads and post-commit invalidation shared by the entity services.
#[derive(Clone)]
pub struct QueryCache {
    memoizer: Arc<Memoizer>,
    trigger: Arc<CacheTrigger>,
    ttl: Ttl,
}

impl QueryCache {
    pub fn new(memoizer: Arc<Memoizer>, trigger: Arc<CacheTrigger>, ttl: Ttl) -> Self {
        Self {
            memoizer,
            trigger,
            ttl,
        }
    }

    pub fn from_handles(handles: &CacheHandles) -> Self {
        Self::new(
            handles.memoizer.clone(),
            handles.trigger.clone(),
            handles.config.default_ttl(),
        )
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn memoizer(&self) -> &Arc<Memoizer> {
        &self.memoizer
    }

    /// `{Types}:{md5}` tagged with the entity type and everything the query reads through.
    pub async fn collection<T, F, Fut>(
        &self,
        query: &TranslatedQuery,
        compute: F,
    ) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let key = items_cache_key(query.entity, &query.params);
        let tags = query_tags(query, None);
        self.memoizer.remember(&key, &tags, self.ttl, compute).await
    }

    /// `{Type}:{id}:{md5}` for a single record fetched with parameters.
    pub async fn record<T, F, Fut>(
        &self,
        query: &TranslatedQuery,
        id: &str,
        compute: F,
    ) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let key = item_cache_key(query.entity, id, Some(&query.params));
        let tags = query_tags(query, Some(id));
        self.memoizer.remember(&key, &tags, self.ttl, compute).await
    }

    /// Bare `{Type}:{id}` fast path.
    pub async fn record_by_id<T, F, Fut>(
        &self,
        entity: EntityType,
        id: &str,
        compute: F,
    ) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let key = item_cache_key(entity, id, None);
        let tags = cache_tags(entity, Some(id));
        self.memoizer.remember(&key, &tags, self.ttl, compute).await
    }

    pub fn begin(&self, entity: EntityType, action: WriteAction) -> PendingInvalidation<'_> {
        self.trigger.begin(entity, action)
    }
}

/// `[Type, Types]`, `Type:id` for single records, plus the singular tag of
/// every other entity type the query reads through.
pub fn query_tags(query: &TranslatedQuery, id: Option<&str>) -> Vec<String> {
    let mut tags = cache_tags(query.entity, id);
    tags.extend(
        query
            .dependencies()
            .into_iter()
            .map(|entity| entity.as_str().to_string()),
    );
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::filter::{QueryParams, spec_for};

    #[test]
    fn query_tags_include_read_through_entities() {
        let query = spec_for(EntityType::Project)
            .translate(&QueryParams::parse("include=timeFrames&add=timeEntriesCount"));
        let tags = query_tags(&query, Some("abc"));
        assert_eq!(
            tags,
            ["Project", "Projects", "Project:abc", "TimeFrame", "TimeEntry"]
        );
    }

    #[test]
    fn plain_query_carries_only_its_own_tags() {
        let query = spec_for(EntityType::TimeEntry).translate(&QueryParams::parse("sort=-workDay"));
        assert_eq!(query_tags(&query, None), ["TimeEntry", "TimeEntrys"]);
    }
}
