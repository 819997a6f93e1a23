//! Repository traits describing persistence adapters.
//!
//! Read repositories execute a [`TranslatedQuery`] as-is. Write repositories
//! run each mutation in its own transaction and only return once it has
//! committed, which is what lets callers schedule cache invalidation after
//! a successful return.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::TranslatedQuery;
use crate::application::pagination::{PageRequest, Paginated};
use crate::domain::entities::{PreferenceRecord, ProjectRecord, TimeEntryRecord, TimeFrameRecord};
use crate::domain::types::{TimeFrameStatus, WeekStart};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Projects are addressable by id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectLookup {
    Id(Uuid),
    Slug(String),
}

impl ProjectLookup {
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub additional_properties: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct UpdateProjectParams {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub additional_properties: serde_json::Value,
}

#[async_trait]
pub trait ProjectsRepo: Send + Sync {
    async fn list_projects(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<ProjectRecord>, RepoError>;

    async fn find_project(
        &self,
        lookup: &ProjectLookup,
        query: &TranslatedQuery,
    ) -> Result<Option<ProjectRecord>, RepoError>;

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait ProjectsWriteRepo: Send + Sync {
    async fn create_project(&self, params: CreateProjectParams)
    -> Result<ProjectRecord, RepoError>;

    async fn update_project(&self, params: UpdateProjectParams)
    -> Result<ProjectRecord, RepoError>;

    /// Soft delete.
    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateTimeFrameParams {
    pub project_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub name: Option<String>,
    pub status: TimeFrameStatus,
    pub notes: Option<String>,
    pub hourly_rate: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateTimeFrameParams {
    pub id: Uuid,
    pub project_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub name: Option<String>,
    pub status: TimeFrameStatus,
    pub notes: Option<String>,
    pub hourly_rate: Option<i64>,
    pub currency: Option<String>,
}

#[async_trait]
pub trait TimeFramesRepo: Send + Sync {
    async fn list_time_frames(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeFrameRecord>, RepoError>;

    async fn find_time_frame(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeFrameRecord>, RepoError>;
}

#[async_trait]
pub trait TimeFramesWriteRepo: Send + Sync {
    async fn create_time_frame(
        &self,
        params: CreateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError>;

    async fn update_time_frame(
        &self,
        params: UpdateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError>;

    /// Soft delete.
    async fn delete_time_frame(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateTimeEntryParams {
    pub time_frame_id: Uuid,
    pub work_day: Date,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub billable: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateTimeEntryParams {
    pub id: Uuid,
    pub time_frame_id: Uuid,
    pub work_day: Date,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub billable: bool,
}

#[async_trait]
pub trait TimeEntriesRepo: Send + Sync {
    async fn list_time_entries(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeEntryRecord>, RepoError>;

    async fn find_time_entry(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeEntryRecord>, RepoError>;
}

#[async_trait]
pub trait TimeEntriesWriteRepo: Send + Sync {
    async fn create_time_entry(
        &self,
        params: CreateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError>;

    async fn update_time_entry(
        &self,
        params: UpdateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError>;

    /// Soft delete.
    async fn delete_time_entry(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct UpsertPreferenceParams {
    pub hourly_rate: i64,
    pub currency: String,
    pub week_start: WeekStart,
    pub additional_properties: serde_json::Value,
}

#[async_trait]
pub trait PreferencesRepo: Send + Sync {
    async fn list_preferences(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<PreferenceRecord>, RepoError>;

    async fn find_preference(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<PreferenceRecord>, RepoError>;

    /// The singleton record, oldest first when more than one exists.
    async fn first_preference(&self) -> Result<Option<PreferenceRecord>, RepoError>;
}

#[async_trait]
pub trait PreferencesWriteRepo: Send + Sync {
    async fn create_preference(
        &self,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError>;

    async fn update_preference(
        &self,
        id: Uuid,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError>;

    async fn delete_preference(&self, id: Uuid) -> Result<(), RepoError>;
}
