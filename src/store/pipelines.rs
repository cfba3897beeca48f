//! Queries over the `pipeline` table.

use sqlx::PgConnection;

use crate::models::Pipeline;

/// A `pipeline` row. `repository_uri` and `version` are nullable in the
/// table; the service guarantees they are present on rows it creates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRow {
    /// Surrogate primary key.
    pub pipeline_id: i64,
    /// Unique business key.
    pub name: String,
    /// URI to bootstrap the pipeline code.
    pub repository_uri: Option<String>,
    /// Pipeline version to use with the URI.
    pub version: Option<String>,
}

impl PipelineRow {
    /// Convert into the wire model.
    pub fn into_model(self) -> Pipeline {
        self.to_model()
    }

    /// Wire model of this row, leaving the row usable.
    pub fn to_model(&self) -> Pipeline {
        Pipeline {
            name: self.name.clone(),
            uri: self.repository_uri.clone(),
            version: self.version.clone(),
        }
    }
}

/// Insert a pipeline row and return it with its assigned id.
///
/// Fails with a unique violation when the name is already taken.
pub async fn insert(
    conn: &mut PgConnection,
    pipeline: &Pipeline,
) -> Result<PipelineRow, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO pipeline (name, repository_uri, version)
         VALUES ($1, $2, $3)
         RETURNING pipeline_id, name, repository_uri, version",
    )
    .bind(&pipeline.name)
    .bind(&pipeline.uri)
    .bind(&pipeline.version)
    .fetch_one(conn)
    .await
}

/// Look a pipeline up by its unique name.
pub async fn find_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<PipelineRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT pipeline_id, name, repository_uri, version
         FROM pipeline
         WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(conn)
    .await
}

/// List pipelines matching the AND of the supplied equality filters.
pub async fn list(
    conn: &mut PgConnection,
    name: Option<&str>,
    uri: Option<&str>,
    version: Option<&str>,
) -> Result<Vec<PipelineRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT pipeline_id, name, repository_uri, version
         FROM pipeline
         WHERE ($1::TEXT IS NULL OR name = $1)
           AND ($2::TEXT IS NULL OR repository_uri = $2)
           AND ($3::TEXT IS NULL OR version = $3)",
    )
    .bind(name)
    .bind(uri)
    .bind(version)
    .fetch_all(conn)
    .await
}
