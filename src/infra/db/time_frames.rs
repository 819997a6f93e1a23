use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::{ComputedField, SortDirection, TranslatedQuery};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CreateTimeFrameParams, RepoError, TimeFramesRepo, TimeFramesWriteRepo, UpdateTimeFrameParams,
};
use crate::domain::entities::TimeFrameRecord;
use crate::domain::types::TimeFrameStatus;

use super::{PostgresRepositories, map_sqlx_error, query};

const COLUMNS: &str = "t.id, t.project_id, t.start_date, t.end_date, t.name, t.status, t.notes, \
                       t.hourly_rate, t.currency, t.created_at, t.updated_at";

/// Seconds across billable entries that have stopped running.
const TOTAL_BILLABLE_SECONDS: &str = "(SELECT COALESCE(SUM(EXTRACT(EPOCH FROM (e.end_time - e.start_time))), 0)::float8 \
     FROM time_entries e \
     WHERE e.time_frame_id = t.id AND e.billable AND e.end_time IS NOT NULL AND e.deleted_at IS NULL)";

const TIME_ENTRIES_COUNT: &str = "(SELECT COUNT(*) FROM time_entries e \
     WHERE e.time_frame_id = t.id AND e.deleted_at IS NULL)";

#[derive(sqlx::FromRow)]
struct TimeFrameRow {
    id: Uuid,
    project_id: Uuid,
    start_date: Date,
    end_date: Date,
    name: Option<String>,
    status: String,
    notes: Option<String>,
    hourly_rate: Option<i64>,
    currency: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    #[sqlx(default)]
    total_billable_seconds: Option<f64>,
    #[sqlx(default)]
    time_entries_count: Option<i64>,
}

impl TryFrom<TimeFrameRow> for TimeFrameRecord {
    type Error = RepoError;

    fn try_from(row: TimeFrameRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TimeFrameStatus>()
            .map_err(|err| RepoError::Integrity {
                message: err.to_string(),
            })?;

        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            start_date: row.start_date,
            end_date: row.end_date,
            name: row.name,
            status,
            notes: row.notes,
            hourly_rate: row.hourly_rate,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
            total_billable_seconds: row.total_billable_seconds,
            time_entries_count: row.time_entries_count,
            time_entries: None,
            project: None,
        })
    }
}

fn into_records(rows: Vec<TimeFrameRow>) -> Result<Vec<TimeFrameRecord>, RepoError> {
    rows.into_iter().map(TimeFrameRecord::try_from).collect()
}

impl PostgresRepositories {
    fn time_frame_select(query: &TranslatedQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COLUMNS);

        if query.computes(ComputedField::TotalBillableSeconds) {
            qb.push(", ");
            qb.push(TOTAL_BILLABLE_SECONDS);
            qb.push(" AS total_billable_seconds");
        }
        if query.include_counts().any(|relation| relation == "timeEntries") {
            qb.push(", ");
            qb.push(TIME_ENTRIES_COUNT);
            qb.push(" AS time_entries_count");
        }

        qb.push(" FROM time_frames ");
        qb.push(query::ROOT);
        query::push_where(&mut qb, query);
        qb
    }

    async fn attach_time_frame_relations(
        &self,
        frames: &mut [TimeFrameRecord],
        query: &TranslatedQuery,
    ) -> Result<(), RepoError> {
        if frames.is_empty() {
            return Ok(());
        }

        if query.include("timeEntries").is_some() {
            let ids: Vec<Uuid> = frames.iter().map(|frame| frame.id).collect();
            let mut entries = self.time_entries_by_frame(&ids).await?;
            for frame in frames.iter_mut() {
                frame.time_entries = Some(entries.remove(&frame.id).unwrap_or_default());
            }
        }
        if query.include("project").is_some() {
            let ids: Vec<Uuid> = frames.iter().map(|frame| frame.project_id).collect();
            let projects = self.projects_by_id(&ids).await?;
            for frame in frames.iter_mut() {
                frame.project = projects.get(&frame.project_id).cloned().map(Box::new);
            }
        }
        Ok(())
    }

    /// Live frames grouped by project, for `include=timeFrames`.
    pub(super) async fn time_frames_by_project(
        &self,
        project_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TimeFrameRecord>>, RepoError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM time_frames t \
             WHERE t.project_id = ANY($1) AND t.deleted_at IS NULL \
             ORDER BY t.start_date DESC, t.id ASC"
        );
        let rows = sqlx::query_as::<_, TimeFrameRow>(&sql)
            .bind(project_ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<Uuid, Vec<TimeFrameRecord>> = HashMap::new();
        for frame in into_records(rows)? {
            grouped.entry(frame.project_id).or_default().push(frame);
        }
        Ok(grouped)
    }

    /// Live frames keyed by id, for `include=timeFrame`.
    pub(super) async fn time_frames_by_id(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, TimeFrameRecord>, RepoError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM time_frames t WHERE t.id = ANY($1) AND t.deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, TimeFrameRow>(&sql)
            .bind(ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(into_records(rows)?
            .into_iter()
            .map(|frame| (frame.id, frame))
            .collect())
    }
}

#[async_trait]
impl TimeFramesRepo for PostgresRepositories {
    async fn list_time_frames(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeFrameRecord>, RepoError> {
        let mut qb = Self::time_frame_select(query);
        query::push_order_by(&mut qb, query, Some(("start_date", SortDirection::Desc)));
        query::push_page(&mut qb, page.limit(), page.offset());

        let rows = qb
            .build_query_as::<TimeFrameRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total = self.count(query).await?;

        let mut frames = into_records(rows)?;
        self.attach_time_frame_relations(&mut frames, query).await?;

        Ok(Paginated::new(frames, total, page))
    }

    async fn find_time_frame(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeFrameRecord>, RepoError> {
        let mut qb = Self::time_frame_select(query);
        qb.push(" AND t.id = ");
        qb.push_bind(id);
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<TimeFrameRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut frames = [TimeFrameRecord::try_from(row)?];
        self.attach_time_frame_relations(&mut frames, query).await?;
        let [frame] = frames;
        Ok(Some(frame))
    }
}

#[async_trait]
impl TimeFramesWriteRepo for PostgresRepositories {
    async fn create_time_frame(
        &self,
        params: CreateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "INSERT INTO time_frames AS t \
                 (id, project_id, start_date, end_date, name, status, notes, hourly_rate, currency, created_at, updated_at) \
             SELECT $1, p.id, $3, $4, $5, $6, $7, $8, $9, now(), now() \
             FROM projects p WHERE p.id = $2 AND p.deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TimeFrameRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.project_id)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.name)
            .bind(params.status.as_str())
            .bind(params.notes)
            .bind(params.hourly_rate)
            .bind(params.currency)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| RepoError::invalid_input("project_id does not reference a live project"))?;
        tx.commit().await.map_err(map_sqlx_error)?;

        TimeFrameRecord::try_from(row)
    }

    async fn update_time_frame(
        &self,
        params: UpdateTimeFrameParams,
    ) -> Result<TimeFrameRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "UPDATE time_frames AS t \
             SET project_id = $2, start_date = $3, end_date = $4, name = $5, status = $6, \
                 notes = $7, hourly_rate = $8, currency = $9, updated_at = now() \
             WHERE t.id = $1 AND t.deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TimeFrameRow>(&sql)
            .bind(params.id)
            .bind(params.project_id)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.name)
            .bind(params.status.as_str())
            .bind(params.notes)
            .bind(params.hourly_rate)
            .bind(params.currency)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        TimeFrameRecord::try_from(row)
    }

    async fn delete_time_frame(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE time_frames SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
