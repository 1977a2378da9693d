use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let conversation_id = state.conversations.create();
    Ok(Json(json!({ "conversation_id": conversation_id })))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let messages = state.conversations.get(conversation_id, params.limit);
    let body: Vec<serde_json::Value> = messages
        .iter()
        .map(|message| {
            json!({
                "role": message.role.as_str(),
                "content": message.content,
            })
        })
        .collect();

    Ok(Json(json!({
        "conversation_id": conversation_id,
        "messages": body,
    })))
}

pub async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let cleared = state.conversations.clear(conversation_id);
    Ok(Json(json!({ "cleared": cleared })))
}
