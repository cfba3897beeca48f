//! Translation of typed errors into HTTP responses.
//!
//! Error bodies are `{"detail": "<message>"}`. Database failures are
//! logged server-side and surface as an opaque 500 so internals never
//! leak onto the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;
use crate::error::ServiceError;

/// An HTTP-ready error: a status code plus a client-facing detail
/// message.
#[derive(Debug)]
pub struct ApiError {
    /// Status code to respond with.
    pub status: StatusCode,
    /// Message for the response body.
    pub detail: String,
}

impl ApiError {
    /// Build an error response.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// The response for a missing or malformed Authorization header.
    pub fn not_authenticated() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Not authenticated")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::MissingField(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Database(e) => {
                error!(error = %e, "request failed on a database error");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database error, please retry the request",
                );
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::Database(e) => {
                error!(error = %e, "credentials lookup failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database error, please retry the request",
                )
            }
            _ => Self::new(StatusCode::FORBIDDEN, err.to_string()),
        }
    }
}
