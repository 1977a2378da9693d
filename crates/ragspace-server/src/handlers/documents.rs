use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ragspace_core::domain::Document;
use ragspace_core::ingestion::UploadDocumentInput;
use ragspace_core::ports::repositories::DocumentSort;
use ragspace_core::CoreError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::actor_from_headers;

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub error_message: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl From<Document> for DocumentView {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            workspace_id: document.workspace_id,
            title: document.title,
            source: document.source,
            tags: document.tags,
            status: document.status.map(|s| s.as_str().to_string()),
            error_message: document.error_message,
            file_name: document.file_name,
            mime_type: document.mime_type,
        }
    }
}

fn parse_sort(raw: Option<&str>) -> DocumentSort {
    match raw {
        Some("created_at_asc") => DocumentSort::CreatedAtAsc,
        Some("title_asc") => DocumentSort::TitleAsc,
        Some("title_desc") => DocumentSort::TitleDesc,
        _ => DocumentSort::CreatedAtDesc,
    }
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<DocumentView>>> {
    let actor = actor_from_headers(&headers)?;
    let documents = state
        .documents
        .list(
            &actor,
            workspace_id,
            parse_sort(params.sort.as_deref()),
            params.limit.unwrap_or(50),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub document_id: Uuid,
    pub status: String,
    pub file_name: String,
    pub mime_type: String,
}

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let actor = actor_from_headers(&headers)?;

    let mut title: Option<String> = None;
    let mut source: Option<String> = None;
    let mut metadata: Option<serde_json::Value> = None;
    let mut file_name: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(CoreError::validation(format!("Malformed multipart: {e}"))))?
    {
        match field.name().unwrap_or_default() {
            "title" => {
                title = Some(field.text().await.map_err(|e| {
                    ApiError(CoreError::validation(format!("Invalid title field: {e}")))
                })?)
            }
            "source" => {
                source = Some(field.text().await.map_err(|e| {
                    ApiError(CoreError::validation(format!("Invalid source field: {e}")))
                })?)
            }
            "metadata" => {
                let raw = field.text().await.map_err(|e| {
                    ApiError(CoreError::validation(format!("Invalid metadata field: {e}")))
                })?;
                metadata = Some(serde_json::from_str(&raw).map_err(|e| {
                    ApiError(CoreError::validation(format!("metadata is not JSON: {e}")))
                })?);
            }
            "file" => {
                file_name = field.file_name().map(str::to_string);
                mime_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| {
                        file_name
                            .as_deref()
                            .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
                    });
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            ApiError(CoreError::validation(format!("Failed to read file: {e}")))
                        })?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let file_name =
        file_name.ok_or_else(|| ApiError(CoreError::validation("file part is required")))?;
    let content =
        content.ok_or_else(|| ApiError(CoreError::validation("file content is required")))?;
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let title = title.unwrap_or_else(|| file_name.clone());

    let output = state
        .upload
        .execute(UploadDocumentInput {
            workspace_id,
            actor,
            title,
            file_name,
            mime_type,
            content,
            source,
            metadata,
            uploaded_by_user_id: actor.user_id,
        })
        .await?;

    Ok(Json(UploadResponse {
        document_id: output.document_id,
        status: output.status.as_str().to_string(),
        file_name: output.file_name,
        mime_type: output.mime_type,
    }))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DocumentView>> {
    let actor = actor_from_headers(&headers)?;
    let document = state.documents.get(&actor, workspace_id, document_id).await?;
    Ok(Json(document.into()))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    state
        .documents
        .delete(&actor, workspace_id, document_id)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn download_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let url = state
        .documents
        .download_url(&actor, workspace_id, document_id)
        .await?;
    Ok(Json(serde_json::json!({ "url": url })))
}

pub async fn document_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let status = state
        .documents
        .status(&actor, workspace_id, document_id)
        .await?;

    Ok(Json(serde_json::json!({
        "document_id": status.document_id,
        "status": status.status.map(|s| s.as_str()),
        "error_message": status.error_message,
        "chunk_count": status.chunk_count,
    })))
}

pub async fn reprocess_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    state
        .documents
        .reprocess(&actor, workspace_id, document_id)
        .await?;
    Ok(Json(serde_json::json!({ "status": "PENDING" })))
}

pub async fn cancel_processing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    state
        .documents
        .cancel_processing(&actor, workspace_id, document_id)
        .await?;
    Ok(Json(serde_json::json!({ "status": "FAILED" })))
}
