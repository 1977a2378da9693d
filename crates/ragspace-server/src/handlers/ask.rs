use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use ragspace_core::services::{AnswerEvent, AskRequest};

use crate::error::ApiResult;
use crate::state::AppState;

use super::actor_from_headers;

#[derive(Deserialize)]
pub struct AskBody {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub use_mmr: Option<bool>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

impl AskBody {
    fn into_request(
        self,
        workspace_id: Uuid,
        actor: ragspace_core::domain::Actor,
    ) -> AskRequest {
        AskRequest {
            workspace_id,
            actor,
            query: self.query,
            top_k: self.top_k,
            use_mmr: self.use_mmr,
            conversation_id: self.conversation_id,
        }
    }
}

/// POST /api/workspaces/{id}/ask
pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let answer = state
        .answer
        .ask(body.into_request(workspace_id, actor))
        .await?;

    Ok(Json(json!({
        "answer": answer.answer,
        "sources": answer.sources,
        "conversation_id": answer.conversation_id,
        "chunks_found": answer.chunks_found,
    })))
}

/// POST /api/workspaces/{id}/ask/stream
///
/// SSE envelope: one `sources`, then `token`s, then exactly one terminal
/// `done` or `error`. Dropping the connection stops token production.
pub async fn ask_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = actor_from_headers(&headers)?;
    let events = state
        .answer
        .ask_stream(body.into_request(workspace_id, actor))
        .await?;

    let sse_stream = events.map(|event| {
        let sse_event = match event {
            AnswerEvent::Sources {
                sources,
                conversation_id,
            } => Event::default().event("sources").data(
                json!({ "sources": sources, "conversation_id": conversation_id }).to_string(),
            ),
            AnswerEvent::Token { token } => Event::default()
                .event("token")
                .data(json!({ "token": token }).to_string()),
            AnswerEvent::Done {
                answer,
                conversation_id,
            } => Event::default().event("done").data(
                json!({ "answer": answer, "conversation_id": conversation_id }).to_string(),
            ),
            AnswerEvent::Error { error } => Event::default()
                .event("error")
                .data(json!({ "error": error }).to_string()),
        };
        Ok(sse_event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
