pub mod ask;
pub mod conversations;
pub mod documents;
pub mod health;
pub mod workspaces;

use axum::http::HeaderMap;
use uuid::Uuid;

use ragspace_core::domain::{Actor, UserRole};
use ragspace_core::CoreError;

use crate::error::ApiError;

/// Identity arrives from the out-of-scope auth gateway as trusted headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok());

    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| match value.to_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "EMPLOYEE" => Some(UserRole::Employee),
            _ => None,
        });

    match (user_id, role) {
        (Some(user_id), Some(role)) => Ok(Actor::new(user_id, role)),
        _ => Err(ApiError(CoreError::forbidden(
            "Missing or invalid identity headers",
        ))),
    }
}
