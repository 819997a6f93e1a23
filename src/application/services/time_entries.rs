use std::sync::Arc;

use serde::Deserialize;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::info;
use uuid::Uuid;

use super::{QueryCache, validation};
use crate::application::error::ServiceError;
use crate::application::filter::{QueryParams, TranslatedQuery, spec_for};
use crate::application::pagination::{PageLimits, PageRequest, Paginated};
use crate::application::repos::{
    CreateTimeEntryParams, TimeEntriesRepo, TimeEntriesWriteRepo, UpdateTimeEntryParams,
};
use crate::cache::WriteAction;
use crate::domain::entities::TimeEntryRecord;
use crate::domain::error::DomainError;
use crate::domain::types::EntityType;

const ENTITY: EntityType = EntityType::TimeEntry;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeEntryInput {
    pub time_frame_id: Option<Uuid>,
    /// RFC 3339; the work day is the calendar date in this timestamp's own offset.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub description: Option<String>,
    pub billable: Option<bool>,
}

struct TimeEntryFields {
    time_frame_id: Uuid,
    work_day: Date,
    start_time: OffsetDateTime,
    end_time: Option<OffsetDateTime>,
    description: Option<String>,
    billable: bool,
}

impl TimeEntryFields {
    /// Derives the work day, then normalises both timestamps to UTC.
    fn validate(input: TimeEntryInput) -> Result<Self, DomainError> {
        let time_frame_id = validation::required("time_frame_id", input.time_frame_id)?;
        let start_time = validation::timestamp(
            "start_time",
            &validation::required("start_time", input.start_time)?,
        )?;
        let end_time = validation::optional_text(input.end_time)
            .map(|raw| validation::timestamp("end_time", &raw))
            .transpose()?;
        if let Some(end_time) = end_time
            && end_time <= start_time
        {
            return Err(DomainError::invalid_field(
                "end_time",
                "must be after start_time",
            ));
        }

        Ok(Self {
            time_frame_id,
            work_day: start_time.date(),
            start_time: start_time.to_offset(UtcOffset::UTC),
            end_time: end_time.map(|end| end.to_offset(UtcOffset::UTC)),
            description: validation::optional_text(input.description),
            billable: input.billable.unwrap_or(true),
        })
    }
}

#[derive(Clone)]
pub struct TimeEntryService {
    reader: Arc<dyn TimeEntriesRepo>,
    writer: Arc<dyn TimeEntriesWriteRepo>,
    cache: QueryCache,
    limits: PageLimits,
}

impl TimeEntryService {
    pub fn new(
        reader: Arc<dyn TimeEntriesRepo>,
        writer: Arc<dyn TimeEntriesWriteRepo>,
        cache: QueryCache,
        limits: PageLimits,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            limits,
        }
    }

    pub async fn list(
        &self,
        params: &QueryParams,
    ) -> Result<Paginated<TimeEntryRecord>, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        let page = PageRequest::from_params(&query.params, self.limits);
        self.cache
            .collection(&query, || async {
                Ok(self.reader.list_time_entries(&query, page).await?)
            })
            .await
    }

    pub async fn get(&self, id: &str, params: &QueryParams) -> Result<TimeEntryRecord, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        self.cache
            .record(&query, id, || self.find(id, &query))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<TimeEntryRecord, ServiceError> {
        let query = TranslatedQuery::empty(ENTITY);
        self.cache
            .record_by_id(ENTITY, id, || self.find(id, &query))
            .await
    }

    pub async fn create(&self, input: TimeEntryInput) -> Result<TimeEntryRecord, ServiceError> {
        let fields = TimeEntryFields::validate(input)?;

        let pending = self.cache.begin(ENTITY, WriteAction::Create);
        let entry = self
            .writer
            .create_time_entry(CreateTimeEntryParams {
                time_frame_id: fields.time_frame_id,
                work_day: fields.work_day,
                start_time: fields.start_time,
                end_time: fields.end_time,
                description: fields.description,
                billable: fields.billable,
            })
            .await?;
        pending.commit(entry.id).await;

        info!(time_entry_id = %entry.id, time_frame_id = %entry.time_frame_id, "Time entry created");
        Ok(entry)
    }

    pub async fn update(
        &self,
        id: &str,
        input: TimeEntryInput,
    ) -> Result<TimeEntryRecord, ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;
        let fields = TimeEntryFields::validate(input)?;

        let pending = self.cache.begin(ENTITY, WriteAction::Update);
        let entry = self
            .writer
            .update_time_entry(UpdateTimeEntryParams {
                id: existing.id,
                time_frame_id: fields.time_frame_id,
                work_day: fields.work_day,
                start_time: fields.start_time,
                end_time: fields.end_time,
                description: fields.description,
                billable: fields.billable,
            })
            .await?;
        pending.commit(entry.id).await;

        info!(time_entry_id = %entry.id, "Time entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;

        let pending = self.cache.begin(ENTITY, WriteAction::Delete);
        self.writer.delete_time_entry(existing.id).await?;
        pending.commit(existing.id).await;

        info!(time_entry_id = %existing.id, "Time entry deleted");
        Ok(())
    }

    async fn find(&self, id: &str, query: &TranslatedQuery) -> Result<TimeEntryRecord, ServiceError> {
        let not_found = || ServiceError::from(DomainError::not_found(ENTITY, id));
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.reader
            .find_time_entry(uuid, query)
            .await?
            .ok_or_else(not_found)
    }
}
