//! Queries over the `task` table.
//!
//! The claim query is the one concurrency-sensitive statement in the
//! system: it locks the selected rows at read time and skips rows
//! already locked by competing claimers, so two workers never lock an
//! overlapping set.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::models::{Pipeline, Task, TaskStatus};

/// A `task` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    /// Surrogate primary key; FIFO tie-break within equal timestamps.
    pub task_id: i64,
    /// Owning pipeline.
    pub pipeline_id: i64,
    /// SHA-256 hex fingerprint of the canonical task input.
    pub job_descriptor: String,
    /// The input document exactly as the client supplied it.
    pub definition: serde_json::Value,
    /// Persisted [`TaskStatus`] literal.
    pub state: String,
    /// Server-assigned creation timestamp.
    pub created: DateTime<Utc>,
}

impl TaskRow {
    /// Convert into the wire model, attaching the owning pipeline.
    pub fn into_model(self, pipeline: Pipeline) -> Result<Task, sqlx::Error> {
        let status = parse_state(&self.state)?;
        Ok(Task {
            pipeline,
            task_input_id: Some(self.job_descriptor),
            task_input: self.definition,
            status: Some(status),
        })
    }
}

/// A `task` row joined with its pipeline, for unscoped listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskListRow {
    /// SHA-256 hex fingerprint of the canonical task input.
    pub job_descriptor: String,
    /// The input document exactly as the client supplied it.
    pub definition: serde_json::Value,
    /// Persisted [`TaskStatus`] literal.
    pub state: String,
    /// Name of the owning pipeline.
    pub pipeline_name: String,
    /// URI of the owning pipeline.
    pub repository_uri: Option<String>,
    /// Version of the owning pipeline.
    pub version: Option<String>,
}

impl TaskListRow {
    /// Convert into the wire model.
    pub fn into_model(self) -> Result<Task, sqlx::Error> {
        let status = parse_state(&self.state)?;
        Ok(Task {
            pipeline: Pipeline {
                name: self.pipeline_name,
                uri: self.repository_uri,
                version: self.version,
            },
            task_input_id: Some(self.job_descriptor),
            task_input: self.definition,
            status: Some(status),
        })
    }
}

/// Parse a persisted state string. Rows are only ever written from
/// [`TaskStatus`], so a failure here means a corrupted row.
fn parse_state(state: &str) -> Result<TaskStatus, sqlx::Error> {
    state
        .parse()
        .map_err(|e: anyhow::Error| sqlx::Error::ColumnDecode {
            index: "state".to_owned(),
            source: e.into(),
        })
}

const TASK_COLUMNS: &str = "task_id, pipeline_id, job_descriptor, definition, state, created";

/// Insert a new PENDING task.
///
/// Fails with a unique violation when the pipeline already has a task
/// with this descriptor.
pub async fn insert_pending(
    conn: &mut PgConnection,
    pipeline_id: i64,
    job_descriptor: &str,
    definition: &serde_json::Value,
) -> Result<TaskRow, sqlx::Error> {
    sqlx::query_as(&format!(
        "INSERT INTO task (pipeline_id, job_descriptor, definition, state)
         VALUES ($1, $2, $3, $4)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(pipeline_id)
    .bind(job_descriptor)
    .bind(definition)
    .bind(TaskStatus::Pending.to_string())
    .fetch_one(conn)
    .await
}

/// Look a task up by its identity within a pipeline.
pub async fn find_by_descriptor(
    conn: &mut PgConnection,
    pipeline_id: i64,
    job_descriptor: &str,
) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS}
         FROM task
         WHERE pipeline_id = $1 AND job_descriptor = $2"
    ))
    .bind(pipeline_id)
    .bind(job_descriptor)
    .fetch_optional(conn)
    .await
}

/// Like [`find_by_descriptor`], but takes an exclusive row lock for the
/// rest of the enclosing transaction.
pub async fn find_by_descriptor_for_update(
    conn: &mut PgConnection,
    pipeline_id: i64,
    job_descriptor: &str,
) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS}
         FROM task
         WHERE pipeline_id = $1 AND job_descriptor = $2
         FOR UPDATE"
    ))
    .bind(pipeline_id)
    .bind(job_descriptor)
    .fetch_optional(conn)
    .await
}

/// Select up to `limit` PENDING tasks of one pipeline in FIFO creation
/// order, locking each selected row. Rows locked by a concurrent
/// claimer are skipped rather than waited on.
pub async fn pending_for_claim(
    conn: &mut PgConnection,
    pipeline_id: i64,
    limit: i64,
) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS}
         FROM task
         WHERE pipeline_id = $1 AND state = $2
         ORDER BY created ASC, task_id ASC
         LIMIT $3
         FOR UPDATE SKIP LOCKED"
    ))
    .bind(pipeline_id)
    .bind(TaskStatus::Pending.to_string())
    .bind(limit)
    .fetch_all(conn)
    .await
}

/// Overwrite the state of one task.
pub async fn set_state(
    conn: &mut PgConnection,
    task_id: i64,
    status: TaskStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE task SET state = $2 WHERE task_id = $1")
        .bind(task_id)
        .bind(status.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// List tasks with their pipelines, filtered by the AND of the supplied
/// predicates. No ordering is guaranteed.
pub async fn list(
    conn: &mut PgConnection,
    pipeline_name: Option<&str>,
    status: Option<TaskStatus>,
) -> Result<Vec<TaskListRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.job_descriptor, t.definition, t.state,
                p.name AS pipeline_name, p.repository_uri, p.version
         FROM task t
         JOIN pipeline p ON p.pipeline_id = t.pipeline_id
         WHERE ($1::TEXT IS NULL OR p.name = $1)
           AND ($2::TEXT IS NULL OR t.state = $2)",
    )
    .bind(pipeline_name)
    .bind(status.map(|s| s.to_string()))
    .fetch_all(conn)
    .await
}
