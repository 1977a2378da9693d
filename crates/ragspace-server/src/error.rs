//! CoreError → HTTP mapping at the API edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use ragspace_core::CoreError;

pub struct ApiError(pub CoreError);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match &self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Embedding { .. } | CoreError::Llm { .. } => StatusCode::BAD_GATEWAY,
        };

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY => {
                tracing::error!(kind, error = %self.0, "request failed");
            }
            _ => tracing::warn!(kind, error = %self.0, "request rejected"),
        }

        let body = Json(ErrorBody {
            error: kind,
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
