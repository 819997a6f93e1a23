use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::{SortDirection, TranslatedQuery};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CreateTimeEntryParams, RepoError, TimeEntriesRepo, TimeEntriesWriteRepo,
    UpdateTimeEntryParams,
};
use crate::domain::entities::TimeEntryRecord;

use super::{PostgresRepositories, map_sqlx_error, query};

const COLUMNS: &str = "t.id, t.time_frame_id, t.work_day, t.start_time, t.end_time, \
                       t.description, t.billable, t.created_at, t.updated_at";

/// Order of entries loaded as a relation.
const RELATION_ORDER: &str = "t.work_day DESC, t.start_time DESC, t.id ASC";

#[derive(sqlx::FromRow)]
struct TimeEntryRow {
    id: Uuid,
    time_frame_id: Uuid,
    work_day: Date,
    start_time: OffsetDateTime,
    end_time: Option<OffsetDateTime>,
    description: Option<String>,
    billable: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TimeEntryRow> for TimeEntryRecord {
    fn from(row: TimeEntryRow) -> Self {
        Self {
            id: row.id,
            time_frame_id: row.time_frame_id,
            work_day: row.work_day,
            start_time: row.start_time,
            end_time: row.end_time,
            description: row.description,
            billable: row.billable,
            created_at: row.created_at,
            updated_at: row.updated_at,
            time_frame: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectEntryRow {
    project_id: Uuid,
    #[sqlx(flatten)]
    entry: TimeEntryRow,
}

impl PostgresRepositories {
    fn time_entry_select(query: &TranslatedQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COLUMNS);
        qb.push(" FROM time_entries ");
        qb.push(query::ROOT);
        query::push_where(&mut qb, query);
        qb
    }

    async fn attach_time_entry_relations(
        &self,
        entries: &mut [TimeEntryRecord],
        query: &TranslatedQuery,
    ) -> Result<(), RepoError> {
        if entries.is_empty() || query.include("timeFrame").is_none() {
            return Ok(());
        }

        let ids: Vec<Uuid> = entries.iter().map(|entry| entry.time_frame_id).collect();
        let frames = self.time_frames_by_id(&ids).await?;
        for entry in entries.iter_mut() {
            entry.time_frame = frames.get(&entry.time_frame_id).cloned().map(Box::new);
        }
        Ok(())
    }

    /// Live entries grouped by frame, for `include=timeEntries` on frames.
    pub(super) async fn time_entries_by_frame(
        &self,
        frame_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TimeEntryRecord>>, RepoError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM time_entries t \
             WHERE t.time_frame_id = ANY($1) AND t.deleted_at IS NULL \
             ORDER BY {RELATION_ORDER}"
        );
        let rows = sqlx::query_as::<_, TimeEntryRow>(&sql)
            .bind(frame_ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<Uuid, Vec<TimeEntryRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.time_frame_id)
                .or_default()
                .push(TimeEntryRecord::from(row));
        }
        Ok(grouped)
    }

    /// Live entries of live frames grouped by project, for `include=timeEntries` on projects.
    pub(super) async fn time_entries_by_project(
        &self,
        project_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TimeEntryRecord>>, RepoError> {
        let sql = format!(
            "SELECT f.project_id, {COLUMNS} FROM time_entries t \
             INNER JOIN time_frames f ON f.id = t.time_frame_id \
             WHERE f.project_id = ANY($1) AND f.deleted_at IS NULL AND t.deleted_at IS NULL \
             ORDER BY {RELATION_ORDER}"
        );
        let rows = sqlx::query_as::<_, ProjectEntryRow>(&sql)
            .bind(project_ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<Uuid, Vec<TimeEntryRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.project_id)
                .or_default()
                .push(TimeEntryRecord::from(row.entry));
        }
        Ok(grouped)
    }
}

#[async_trait]
impl TimeEntriesRepo for PostgresRepositories {
    async fn list_time_entries(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<TimeEntryRecord>, RepoError> {
        let mut qb = Self::time_entry_select(query);
        query::push_order_by(&mut qb, query, Some(("start_time", SortDirection::Desc)));
        query::push_page(&mut qb, page.limit(), page.offset());

        let rows = qb
            .build_query_as::<TimeEntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total = self.count(query).await?;

        let mut entries: Vec<TimeEntryRecord> =
            rows.into_iter().map(TimeEntryRecord::from).collect();
        self.attach_time_entry_relations(&mut entries, query).await?;

        Ok(Paginated::new(entries, total, page))
    }

    async fn find_time_entry(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<TimeEntryRecord>, RepoError> {
        let mut qb = Self::time_entry_select(query);
        qb.push(" AND t.id = ");
        qb.push_bind(id);
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<TimeEntryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entries = [TimeEntryRecord::from(row)];
        self.attach_time_entry_relations(&mut entries, query).await?;
        let [entry] = entries;
        Ok(Some(entry))
    }
}

#[async_trait]
impl TimeEntriesWriteRepo for PostgresRepositories {
    async fn create_time_entry(
        &self,
        params: CreateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "INSERT INTO time_entries AS t \
                 (id, time_frame_id, work_day, start_time, end_time, description, billable, created_at, updated_at) \
             SELECT $1, f.id, $3, $4, $5, $6, $7, now(), now() \
             FROM time_frames f WHERE f.id = $2 AND f.deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TimeEntryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.time_frame_id)
            .bind(params.work_day)
            .bind(params.start_time)
            .bind(params.end_time)
            .bind(params.description)
            .bind(params.billable)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| {
                RepoError::invalid_input("time_frame_id does not reference a live time frame")
            })?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(TimeEntryRecord::from(row))
    }

    async fn update_time_entry(
        &self,
        params: UpdateTimeEntryParams,
    ) -> Result<TimeEntryRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "UPDATE time_entries AS t \
             SET time_frame_id = $2, work_day = $3, start_time = $4, end_time = $5, \
                 description = $6, billable = $7, updated_at = now() \
             WHERE t.id = $1 AND t.deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TimeEntryRow>(&sql)
            .bind(params.id)
            .bind(params.time_frame_id)
            .bind(params.work_day)
            .bind(params.start_time)
            .bind(params.end_time)
            .bind(params.description)
            .bind(params.billable)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(TimeEntryRecord::from(row))
    }

    async fn delete_time_entry(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE time_entries SET deleted_at = now(), updated_at = now() \
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
