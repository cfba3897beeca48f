//! Postgres-backed persistence.
//!
//! [`Store`] owns the connection pool; the query modules expose free
//! functions that take `&mut PgConnection` so the services can compose
//! several of them inside a single transaction. Readers that do not
//! mutate run straight off the pool and acquire no row locks.

pub mod events;
pub mod pipelines;
pub mod tasks;
pub mod tokens;

use std::str::FromStr;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Connection pool plus the schema all queries run against.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    schema: String,
}

impl Store {
    /// Connect a pool to `db_url` with `search_path` set to `schema`.
    ///
    /// The schema does not need to exist yet; [`Store::deploy_schema`]
    /// creates it together with the tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the server is
    /// unreachable.
    pub async fn connect(db_url: &str, schema: &str) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(db_url)
            .context("failed to parse DB_URL")?
            .options([("search_path", schema)]);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("failed to connect to the database")?;

        Ok(Self {
            pool,
            schema: schema.to_owned(),
        })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema (if missing) and all tables, constraints and
    /// indexes. Idempotent; safe to run against an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn deploy_schema(&self) -> anyhow::Result<()> {
        // Identifier, not a bind parameter; quote it as one.
        let quoted = self.schema.replace('"', "\"\"");
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{quoted}\""))
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to create schema {}", self.schema))?;

        sqlx::raw_sql(include_str!("../../migrations/schema.sql"))
            .execute(&self.pool)
            .await
            .context("failed to deploy schema")?;

        Ok(())
    }

    /// Drop the schema and everything in it. Test fixtures only.
    ///
    /// # Errors
    ///
    /// Returns an error if the DROP statement fails.
    pub async fn drop_schema(&self) -> anyhow::Result<()> {
        let quoted = self.schema.replace('"', "\"\"");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{quoted}\" CASCADE"))
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to drop schema {}", self.schema))?;

        Ok(())
    }
}
