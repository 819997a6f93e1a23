use std::sync::Arc;

use crate::application::pagination::PageLimits;
use crate::application::repos::{
    PreferencesRepo, PreferencesWriteRepo, ProjectsRepo, ProjectsWriteRepo, TimeEntriesRepo,
    TimeEntriesWriteRepo, TimeFramesRepo, TimeFramesWriteRepo,
};
use crate::application::services::{
    PreferenceService, ProjectService, QueryCache, TimeEntryService, TimeFrameService,
};
use crate::cache::{CacheHandles, DerivedRegion};

#[derive(Clone)]
pub struct ApiState {
    pub projects: Arc<ProjectService>,
    pub time_frames: Arc<TimeFrameService>,
    pub time_entries: Arc<TimeEntryService>,
    pub preferences: Arc<PreferenceService>,
    pub derived: Arc<DerivedRegion>,
}

impl ApiState {
    /// Wire every service onto one repository implementation and one cache.
    pub fn new<R>(repositories: Arc<R>, cache: &CacheHandles, limits: PageLimits) -> Self
    where
        R: ProjectsRepo
            + ProjectsWriteRepo
            + TimeFramesRepo
            + TimeFramesWriteRepo
            + TimeEntriesRepo
            + TimeEntriesWriteRepo
            + PreferencesRepo
            + PreferencesWriteRepo
            + 'static,
    {
        let query_cache = QueryCache::from_handles(cache);

        let projects_repo: Arc<dyn ProjectsRepo> = repositories.clone();
        let projects_write_repo: Arc<dyn ProjectsWriteRepo> = repositories.clone();
        let time_frames_repo: Arc<dyn TimeFramesRepo> = repositories.clone();
        let time_frames_write_repo: Arc<dyn TimeFramesWriteRepo> = repositories.clone();
        let time_entries_repo: Arc<dyn TimeEntriesRepo> = repositories.clone();
        let time_entries_write_repo: Arc<dyn TimeEntriesWriteRepo> = repositories.clone();
        let preferences_repo: Arc<dyn PreferencesRepo> = repositories.clone();
        let preferences_write_repo: Arc<dyn PreferencesWriteRepo> = repositories;

        Self {
            projects: Arc::new(ProjectService::new(
                projects_repo,
                projects_write_repo,
                query_cache.clone(),
                limits,
            )),
            time_frames: Arc::new(TimeFrameService::new(
                time_frames_repo,
                time_frames_write_repo,
                query_cache.clone(),
                limits,
            )),
            time_entries: Arc::new(TimeEntryService::new(
                time_entries_repo,
                time_entries_write_repo,
                query_cache.clone(),
                limits,
            )),
            preferences: Arc::new(PreferenceService::new(
                preferences_repo,
                preferences_write_repo,
                query_cache,
                cache.config.preference_ttl(),
            )),
            derived: cache.derived.clone(),
        }
    }
}
