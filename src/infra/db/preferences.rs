use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::filter::{SortDirection, TranslatedQuery};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    PreferencesRepo, PreferencesWriteRepo, RepoError, UpsertPreferenceParams,
};
use crate::domain::entities::PreferenceRecord;
use crate::domain::types::WeekStart;

use super::{PostgresRepositories, map_sqlx_error, query};

const COLUMNS: &str = "t.id, t.hourly_rate, t.currency, t.week_start, t.additional_properties, \
                       t.created_at, t.updated_at";

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    id: Uuid,
    hourly_rate: i64,
    currency: String,
    week_start: String,
    additional_properties: serde_json::Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PreferenceRow> for PreferenceRecord {
    type Error = RepoError;

    fn try_from(row: PreferenceRow) -> Result<Self, Self::Error> {
        let week_start = row
            .week_start
            .parse::<WeekStart>()
            .map_err(|err| RepoError::Integrity {
                message: err.to_string(),
            })?;

        Ok(Self {
            id: row.id,
            hourly_rate: row.hourly_rate,
            currency: row.currency,
            week_start,
            additional_properties: row.additional_properties,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PostgresRepositories {
    fn preference_select(query: &TranslatedQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COLUMNS);
        qb.push(" FROM preferences ");
        qb.push(query::ROOT);
        query::push_where(&mut qb, query);
        qb
    }
}

#[async_trait]
impl PreferencesRepo for PostgresRepositories {
    async fn list_preferences(
        &self,
        query: &TranslatedQuery,
        page: PageRequest,
    ) -> Result<Paginated<PreferenceRecord>, RepoError> {
        let mut qb = Self::preference_select(query);
        query::push_order_by(&mut qb, query, Some(("created_at", SortDirection::Asc)));
        query::push_page(&mut qb, page.limit(), page.offset());

        let rows = qb
            .build_query_as::<PreferenceRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total = self.count(query).await?;

        let preferences = rows
            .into_iter()
            .map(PreferenceRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(preferences, total, page))
    }

    async fn find_preference(
        &self,
        id: Uuid,
        query: &TranslatedQuery,
    ) -> Result<Option<PreferenceRecord>, RepoError> {
        let mut qb = Self::preference_select(query);
        qb.push(" AND t.id = ");
        qb.push_bind(id);
        qb.push(" LIMIT 1");

        qb.build_query_as::<PreferenceRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(PreferenceRecord::try_from)
            .transpose()
    }

    async fn first_preference(&self) -> Result<Option<PreferenceRecord>, RepoError> {
        let sql = format!("SELECT {COLUMNS} FROM preferences t ORDER BY t.created_at ASC, t.id ASC LIMIT 1");
        sqlx::query_as::<_, PreferenceRow>(&sql)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(PreferenceRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl PreferencesWriteRepo for PostgresRepositories {
    async fn create_preference(
        &self,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "INSERT INTO preferences AS t \
                 (id, hourly_rate, currency, week_start, additional_properties, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now(), now()) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.hourly_rate)
            .bind(params.currency)
            .bind(params.week_start.as_str())
            .bind(params.additional_properties)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        PreferenceRecord::try_from(row)
    }

    async fn update_preference(
        &self,
        id: Uuid,
        params: UpsertPreferenceParams,
    ) -> Result<PreferenceRecord, RepoError> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "UPDATE preferences AS t \
             SET hourly_rate = $2, currency = $3, week_start = $4, additional_properties = $5, \
                 updated_at = now() \
             WHERE t.id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(id)
            .bind(params.hourly_rate)
            .bind(params.currency)
            .bind(params.week_start.as_str())
            .bind(params.additional_properties)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        PreferenceRecord::try_from(row)
    }

    async fn delete_preference(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM preferences WHERE id = $1")
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
