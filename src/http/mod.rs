//! HTTP/JSON gateway.
//!
//! Maps verbs and paths onto service calls, translates typed errors to
//! status codes, and guards every route with the bearer-token
//! middleware. The gateway holds no state of its own beyond the shared
//! service handles.

pub mod auth;
pub mod error;
pub mod pipelines;
pub mod tasks;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::Validator;
use crate::service::{PipelineService, TaskService};
use crate::store::Store;

/// Shared handles threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    /// Credential validator.
    pub validator: Validator,
    /// Pipeline CRUD and token minting.
    pub pipelines: PipelineService,
    /// Task lifecycle operations.
    pub tasks: TaskService,
}

impl AppState {
    /// Build the application state over one store.
    pub fn new(store: Store) -> Self {
        Self {
            validator: Validator::new(store.clone()),
            pipelines: PipelineService::new(store.clone()),
            tasks: TaskService::new(store),
        }
    }
}

/// Build the full route table. Every route requires a valid bearer
/// token; the middleware resolves it to a [`crate::models::Permission`]
/// and stores it in the request extensions.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pipelines", get(pipelines::list).post(pipelines::create))
        .route("/pipelines/{pipeline_name}", get(pipelines::get_one))
        .route(
            "/pipelines/{pipeline_name}/token/{token_desc}",
            post(pipelines::create_token),
        )
        .route(
            "/tasks",
            get(tasks::list).post(tasks::create).put(tasks::update),
        )
        .route("/tasks/claim", post(tasks::claim))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_permission,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
