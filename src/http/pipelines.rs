//! Handlers for the `/pipelines` routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::models::{Permission, Pipeline};

/// Equality filters accepted by the pipeline listing.
#[derive(Debug, Deserialize)]
pub struct PipelineFilters {
    /// Match on the bootstrap URI.
    pub uri: Option<String>,
    /// Match on the pipeline version.
    pub version: Option<String>,
}

/// GET /pipelines
pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<PipelineFilters>,
) -> Result<Json<Vec<Pipeline>>, ApiError> {
    let pipelines = state
        .pipelines
        .list_pipelines(None, filters.uri.as_deref(), filters.version.as_deref())
        .await?;
    Ok(Json(pipelines))
}

/// GET /pipelines/{pipeline_name}
pub async fn get_one(
    State(state): State<AppState>,
    Path(pipeline_name): Path<String>,
) -> Result<Json<Pipeline>, ApiError> {
    let pipeline = state.pipelines.get_pipeline(&pipeline_name).await?;
    Ok(Json(pipeline))
}

/// POST /pipelines
pub async fn create(
    State(state): State<AppState>,
    Extension(permission): Extension<Permission>,
    Json(pipeline): Json<Pipeline>,
) -> Result<Response, ApiError> {
    let created = state
        .pipelines
        .create_pipeline(&permission, &pipeline)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// POST /pipelines/{pipeline_name}/token/{token_desc}
pub async fn create_token(
    State(state): State<AppState>,
    Path((pipeline_name, token_desc)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let token = state
        .pipelines
        .mint_token(&pipeline_name, &token_desc)
        .await?;
    Ok((StatusCode::CREATED, Json(token)).into_response())
}
