//! Queries over the append-only `event` table.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::models::Event;

/// An `event` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Surrogate primary key; insertion-order tie-break.
    pub event_id: i64,
    /// Task the change applies to.
    pub task_id: i64,
    /// Token that caused the change.
    pub token_id: i64,
    /// Server-assigned timestamp of the change.
    pub time: DateTime<Utc>,
    /// What happened, e.g. `Created` or `Task claimed`.
    pub change: String,
}

impl EventRow {
    /// Convert into the wire model.
    pub fn into_model(self) -> Event {
        Event {
            time: self.time,
            change: self.change,
        }
    }
}

/// Append one audit record for a task. Events are never updated or
/// deleted afterwards.
pub async fn append(
    conn: &mut PgConnection,
    task_id: i64,
    token_id: i64,
    change: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO event (task_id, token_id, change) VALUES ($1, $2, $3)")
        .bind(task_id)
        .bind(token_id)
        .bind(change)
        .execute(conn)
        .await?;
    Ok(())
}

/// All events for the task with the given descriptor, in insertion
/// order.
pub async fn for_descriptor(
    conn: &mut PgConnection,
    job_descriptor: &str,
) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT e.event_id, e.task_id, e.token_id, e.time, e.change
         FROM event e
         JOIN task t ON t.task_id = e.task_id
         WHERE t.job_descriptor = $1
         ORDER BY e.time ASC, e.event_id ASC",
    )
    .bind(job_descriptor)
    .fetch_all(conn)
    .await
}
