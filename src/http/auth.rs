//! Bearer-token middleware.
//!
//! Runs before every route: extracts the `Authorization: Bearer` value,
//! resolves it to a [`Permission`] and stashes it in the request
//! extensions for handlers to pick up. Rejections carry only the
//! validation reason, never the presented credential.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::error::ApiError;
use super::AppState;

/// Validate the request's bearer token or reject with 403.
pub async fn require_permission(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(bearer) = bearer_token(&request).map(str::to_owned) else {
        return ApiError::not_authenticated().into_response();
    };

    match state.validator.token_to_permission(&bearer).await {
        Ok(permission) => {
            request.extensions_mut().insert(permission);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "credentials rejected");
            ApiError::from(e).into_response()
        }
    }
}

/// Pull the bearer value out of the Authorization header, if present.
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
