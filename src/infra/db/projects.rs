use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::filter::{ComputedField, SortDirection, TranslatedQuery};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CreateProjectParams, ProjectLookup, ProjectsRepo, ProjectsWriteRepo, RepoError,
    UpdateProjectParams,
};
use crate::domain::entities::ProjectRecord;

use super::{PostgresRepositories, map_sqlx_error, query};

const COLUMNS: &str = "t.id, t.name, t.slug, t.description, t.additional_properties, \
                       t.created_at, t.updated_at";

const TIME_FRAMES_COUNT: &str = "(SELECT COUNT(*) FROM time_frames f \
     WHERE f.project_id = t.id AND f.deleted_at IS NULL)";

const TIME_ENTRIES_COUNT: &str = "(SELECT COUNT(*) FROM time_entries e \
     INNER JOIN time_frames f ON f.id = e.time_frame_id \
     WHERE f.project_id = t.id AND f.deleted_at IS NULL AND e.deleted_at IS NULL)";

#[derive(sqlx::FromRow)]
pub(super) struct ProjectRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    additional_properties: serde_json::Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    #[sqlx(default)]
    time_frames_count: Option<i64>,
    #[sqlx(default)]
    time_entries_count: Option<i64>,
}

impl From<ProjectRow> for ProjectRecord {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            additional_properties: row.additional_properties,
            created_at: row.created_at,
            updated_at: row.updated_at,
            time_frames_count: row.time_frames_count,
            time_entries_count: row.time_entries_count,
            time_frames: None,
            time_entries: None,
        }
    }
}

impl PostgresRepositories {
    fn project_select(query: &TranslatedQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COLUMNS);

        let counts: Vec<&str> = query.include_counts().collect();
        if query.computes(ComputedField::TimeFramesCount) || counts.contains(&"timeFrames") {
            qb.push(", ");
            qb.push(TIME_FRAMES_COUNT);
            qb.push(" AS time_frames_count");
        }
        if query.computes(ComputedField::TimeEntriesCount) || counts.contains(&"timeEntries") {
            qb.push(", ");
            qb.push(TIME_ENTRIES_COUNT);
            qb.push(" AS time_entries_count");
        }

        qb.push(" FROM projects ");
        qb.push(query::ROOT);
        query::push_where(&mut qb, query);
        qb
    }

    async fn attach_project_relations(
        &self,
        projects: &mut [ProjectRecord],
        query: &TranslatedQuery,
    ) -> Result<(), RepoError> {
        if projects.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = projects.iter().map(|project| project.id).collect();

        if query.include("timeFrames").is_some() {
            let mut frames = self.time_frames_by_project(&ids).await?;
            for project in projects.iter_mut() {
                project.time_frames = Some(frames.remove(&project.id).unwrap_or_default());
            }
        }
        if query.include("timeEntries").is_some() {
            let mut entries = self.time_entries_by_project(&ids).await?;
            for project in projects.iter_mut() {
                project.time_entries = Some(entries.remove(&project.id).unwrap_or_default());
            }
        }
        Ok(())
    }

    /// Live projects keyed by id, for `include=project`.
    pub(super) async fn projects_by_id(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProjectRecord>, RepoError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM projects t WHERE t.id = ANY($1) AND t.deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, ProjectRecord::from(row)))
            .collect())
    }
}

#[async_trait]
impl ProjectsRepo for PostgresRepositories {
    async fn list_projects(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<ProjectRecord>, RepoError> {
        let mut qb = Self::project_select(query);
        query::push_order_by(&mut qb, query, Some(("created_at", SortDirection::Desc)));
        query::push_page(&mut qb, page.limit(), page.offset());

        let rows = qb
            .build_query_as::<ProjectRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total = self.count(query).await?;

        let mut projects: Vec<ProjectRecord> = rows.into_iter().map(ProjectRecord::from).collect();
        self.attach_project_relations(&mut projects, query).await?;

        Ok(Paginated::new(projects, total, page))
    }

    async fn find_project(
        &self,
        lookup: &ProjectLookup,
        query: &TranslatedQuery,
    ) -> Result<Option<ProjectRecord>, RepoError> {
        let mut qb = Self::project_select(query);
        match lookup {
            ProjectLookup::Id(id) => {
                qb.push(" AND t.id = ");
                qb.push_bind(*id);
            }
            ProjectLookup::Slug(slug) => {
                qb.push(" AND t.slug = ");
                qb.push_bind(slug.clone());
            }
        }
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut projects = [ProjectRecord::from(row)];
        self.attach_project_relations(&mut projects, query).await?;
        let [project] = projects;
        Ok(Some(project))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        // Soft-deleted rows still hold their slug under the unique index.
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ProjectsWriteRepo for PostgresRepositories {
    async fn create_project(
        &self,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "INSERT INTO projects AS t (id, name, slug, description, additional_properties, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now(), now()) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.name)
            .bind(params.slug)
            .bind(params.description)
            .bind(params.additional_properties)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ProjectRecord::from(row))
    }

    async fn update_project(
        &self,
        params: UpdateProjectParams,
    ) -> Result<ProjectRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "UPDATE projects AS t \
             SET name = $2, slug = $3, description = $4, additional_properties = $5, updated_at = now() \
             WHERE t.id = $1 AND t.deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(params.id)
            .bind(params.name)
            .bind(params.slug)
            .bind(params.description)
            .bind(params.additional_properties)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ProjectRecord::from(row))
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE projects SET deleted_at = now(), updated_at = now() \
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
