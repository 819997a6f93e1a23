use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{QueryCache, validation};
use crate::application::error::ServiceError;
use crate::application::filter::{QueryParams, TranslatedQuery, spec_for};
use crate::application::pagination::{PageLimits, PageRequest, Paginated};
use crate::application::repos::{
    CreateTimeFrameParams, TimeFramesRepo, TimeFramesWriteRepo, UpdateTimeFrameParams,
};
use crate::cache::WriteAction;
use crate::domain::entities::TimeFrameRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{EntityType, TimeFrameStatus};

const ENTITY: EntityType = EntityType::TimeFrame;

/// Relations and aggregates an updated frame is returned with.
pub const RELOAD_QUERY: &str = "include=timeEntries,project:id;name;slug&add=totalBillableSeconds";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeFrameInput {
    pub project_id: Option<Uuid>,
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    /// Major currency units.
    pub hourly_rate: Option<f64>,
    pub currency: Option<String>,
}

/// Checked field values shared by create and update.
struct TimeFrameFields {
    start_date: time::Date,
    end_date: time::Date,
    name: Option<String>,
    status: Option<TimeFrameStatus>,
    notes: Option<String>,
    hourly_rate: i64,
    currency: String,
}

impl TimeFrameFields {
    fn validate(input: TimeFrameInput) -> Result<Self, DomainError> {
        let start_date = validation::date(
            "start_date",
            &validation::required("start_date", input.start_date)?,
        )?;
        let end_date =
            validation::date("end_date", &validation::required("end_date", input.end_date)?)?;
        if end_date < start_date {
            return Err(DomainError::invalid_field(
                "end_date",
                "must be on or after start_date",
            ));
        }

        let name = validation::optional_text(input.name);
        if let Some(name) = &name {
            validation::max_length("name", name)?;
        }
        let status = validation::optional_text(input.status)
            .map(|raw| raw.parse::<TimeFrameStatus>())
            .transpose()?;
        let hourly_rate = validation::rate_in_cents(
            "hourly_rate",
            validation::required("hourly_rate", input.hourly_rate)?,
        )?;
        let currency = validation::currency("currency", input.currency)?;

        Ok(Self {
            start_date,
            end_date,
            name,
            status,
            notes: validation::optional_text(input.notes),
            hourly_rate,
            currency,
        })
    }
}

#[derive(Clone)]
pub struct TimeFrameService {
    reader: Arc<dyn TimeFramesRepo>,
    writer: Arc<dyn TimeFramesWriteRepo>,
    cache: QueryCache,
    limits: PageLimits,
}

impl TimeFrameService {
    pub fn new(
        reader: Arc<dyn TimeFramesRepo>,
        writer: Arc<dyn TimeFramesWriteRepo>,
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
    ) -> Result<Paginated<TimeFrameRecord>, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        let page = PageRequest::from_params(&query.params, self.limits);
        self.cache
            .collection(&query, || async {
                Ok(self.reader.list_time_frames(&query, page).await?)
            })
            .await
    }

    pub async fn get(&self, id: &str, params: &QueryParams) -> Result<TimeFrameRecord, ServiceError> {
        let query = spec_for(ENTITY).translate(params);
        self.cache
            .record(&query, id, || self.find(id, &query))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<TimeFrameRecord, ServiceError> {
        let query = TranslatedQuery::empty(ENTITY);
        self.cache
            .record_by_id(ENTITY, id, || self.find(id, &query))
            .await
    }

    pub async fn create(&self, input: TimeFrameInput) -> Result<TimeFrameRecord, ServiceError> {
        let project_id = validation::required("project_id", input.project_id)?;
        let fields = TimeFrameFields::validate(input)?;

        let pending = self.cache.begin(ENTITY, WriteAction::Create);
        let frame = self
            .writer
            .create_time_frame(CreateTimeFrameParams {
                project_id,
                start_date: fields.start_date,
                end_date: fields.end_date,
                name: fields.name,
                status: fields.status.unwrap_or_default(),
                notes: fields.notes,
                hourly_rate: Some(fields.hourly_rate),
                currency: Some(fields.currency),
            })
            .await?;
        pending.commit(frame.id).await;

        info!(time_frame_id = %frame.id, project_id = %frame.project_id, "Time frame created");
        Ok(frame)
    }

    /// Returns the frame reloaded with its entries, project and billable total.
    pub async fn update(
        &self,
        id: &str,
        input: TimeFrameInput,
    ) -> Result<TimeFrameRecord, ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;
        let project_id = input.project_id.unwrap_or(existing.project_id);
        let fields = TimeFrameFields::validate(input)?;

        let pending = self.cache.begin(ENTITY, WriteAction::Update);
        let frame = self
            .writer
            .update_time_frame(UpdateTimeFrameParams {
                id: existing.id,
                project_id,
                start_date: fields.start_date,
                end_date: fields.end_date,
                name: fields.name,
                status: fields.status.unwrap_or(existing.status),
                notes: fields.notes,
                hourly_rate: Some(fields.hourly_rate),
                currency: Some(fields.currency),
            })
            .await?;
        pending.commit(frame.id).await;

        info!(time_frame_id = %frame.id, "Time frame updated");

        let reload = spec_for(ENTITY).translate(&QueryParams::parse(RELOAD_QUERY));
        self.find(&frame.id.to_string(), &reload).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.find(id, &TranslatedQuery::empty(ENTITY)).await?;

        let pending = self.cache.begin(ENTITY, WriteAction::Delete);
        self.writer.delete_time_frame(existing.id).await?;
        pending.commit(existing.id).await;

        info!(time_frame_id = %existing.id, "Time frame deleted");
        Ok(())
    }

    async fn find(&self, id: &str, query: &TranslatedQuery) -> Result<TimeFrameRecord, ServiceError> {
        let not_found = || ServiceError::from(DomainError::not_found(ENTITY, id));
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.reader
            .find_time_frame(uuid, query)
            .await?
            .ok_or_else(not_found)
    }
}
