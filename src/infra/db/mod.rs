//! Postgres-backed repository implementations.
//!
//! Reads render the translated query through [`query`]; relations requested
//! with `include` are loaded with one follow-up statement per relation.
//! Every write runs in its own transaction and returns only after commit.

mod preferences;
mod projects;
pub mod query;
mod time_entries;
mod time_frames;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query as raw_query,
};

use crate::application::filter::TranslatedQuery;
use crate::application::repos::RepoError;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, RepoError> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        raw_query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// `SELECT COUNT(*)` over the same predicates a list statement applies.
    async fn count(&self, query: &TranslatedQuery) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        qb.push(query::table(query.entity));
        qb.push(' ');
        qb.push(query::ROOT);
        query::push_where(&mut qb, query);

        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(query::convert_count(total))
    }
}
