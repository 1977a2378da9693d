use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(db) = &state.db {
        if !db.ping().await {
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    }
    Ok(Json(json!({ "status": "ready" })))
}
