//! Queries over the `token` table.
//!
//! Token rows are never deleted; revocation sets `date_revoked` so the
//! event log's back-references stay resolvable.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::models::Pipeline;

/// A `token` row LEFT JOINed with its pipeline. The join must be an
/// outer one: a power-user token has no pipeline, and the row must
/// still be found.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRow {
    /// Surrogate primary key, recorded on events as the requestor.
    pub token_id: i64,
    /// Set when the token has been revoked.
    pub date_revoked: Option<DateTime<Utc>>,
    /// Name of the bound pipeline; NULL for power-user tokens.
    pub pipeline_name: Option<String>,
    /// URI of the bound pipeline.
    pub repository_uri: Option<String>,
    /// Version of the bound pipeline.
    pub version: Option<String>,
}

impl TokenRow {
    /// The pipeline this token is bound to, if any.
    pub fn pipeline(&self) -> Option<Pipeline> {
        self.pipeline_name.clone().map(|name| Pipeline {
            name,
            uri: self.repository_uri.clone(),
            version: self.version.clone(),
        })
    }
}

/// Look up a token row by the credential string.
pub async fn find(conn: &mut PgConnection, token: &str) -> Result<Option<TokenRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.token_id, t.date_revoked,
                p.name AS pipeline_name, p.repository_uri, p.version
         FROM token t
         LEFT JOIN pipeline p ON p.pipeline_id = t.pipeline_id
         WHERE t.token = $1",
    )
    .bind(token)
    .fetch_optional(conn)
    .await
}

/// Insert a freshly minted token for a pipeline; returns its id.
pub async fn insert(
    conn: &mut PgConnection,
    pipeline_id: i64,
    token: &str,
    description: &str,
) -> Result<i64, sqlx::Error> {
    let (token_id,): (i64,) = sqlx::query_as(
        "INSERT INTO token (token, pipeline_id, description)
         VALUES ($1, $2, $3)
         RETURNING token_id",
    )
    .bind(token)
    .bind(pipeline_id)
    .bind(description)
    .fetch_one(conn)
    .await?;
    Ok(token_id)
}

/// Mark a token as revoked. Idempotent; keeps the first revocation
/// timestamp if called twice.
pub async fn revoke(conn: &mut PgConnection, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE token
         SET date_revoked = COALESCE(date_revoked, now())
         WHERE token = $1",
    )
    .bind(token)
    .execute(conn)
    .await?;
    Ok(())
}
