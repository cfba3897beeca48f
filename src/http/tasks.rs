//! Handlers for the `/tasks` routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::models::{Permission, Pipeline, Task, TaskStatus};

/// Filters accepted by the task listing.
#[derive(Debug, Deserialize)]
pub struct TaskFilters {
    /// Restrict to one pipeline's tasks.
    pub pipeline_name: Option<String>,
    /// Restrict to tasks in one state.
    pub status: Option<TaskStatus>,
}

/// Query parameters of the claim route.
#[derive(Debug, Deserialize)]
pub struct ClaimParams {
    /// Upper bound on the number of tasks to claim; defaults to 1.
    #[serde(default = "default_num_tasks")]
    pub num_tasks: i64,
}

fn default_num_tasks() -> i64 {
    1
}

/// GET /tasks
pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<TaskFilters>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .tasks
        .list_tasks(filters.pipeline_name.as_deref(), filters.status)
        .await?;
    Ok(Json(tasks))
}

/// POST /tasks — 201 when the task is new, 200 when an identical task
/// already existed.
pub async fn create(
    State(state): State<AppState>,
    Extension(permission): Extension<Permission>,
    Json(task): Json<Task>,
) -> Result<Response, ApiError> {
    let (task, created) = state.tasks.create_task(&permission, &task).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(task)).into_response())
}

/// PUT /tasks
pub async fn update(
    State(state): State<AppState>,
    Extension(permission): Extension<Permission>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    let updated = state.tasks.update_task(&permission, &task).await?;
    Ok(Json(updated))
}

/// POST /tasks/claim?num_tasks=N
pub async fn claim(
    State(state): State<AppState>,
    Extension(permission): Extension<Permission>,
    Query(params): Query<ClaimParams>,
    Json(pipeline): Json<Pipeline>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .tasks
        .claim_tasks(&permission, &pipeline, params.num_tasks)
        .await?;
    Ok(Json(tasks))
}
