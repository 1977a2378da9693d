use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ragspace_core::domain::{AclRole, Workspace, WorkspaceVisibility};
use ragspace_core::services::CreateWorkspaceInput;
use ragspace_core::CoreError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::actor_from_headers;

#[derive(Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    pub owner_user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateWorkspaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Deserialize)]
pub struct ShareRequest {
    pub entries: Vec<ShareEntry>,
}

#[derive(Deserialize)]
pub struct ShareEntry {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct GrantRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct WorkspaceView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub visibility: String,
    pub owner_user_id: Option<Uuid>,
    pub archived: bool,
}

impl From<Workspace> for WorkspaceView {
    fn from(workspace: Workspace) -> Self {
        Self {
            id: workspace.id,
            visibility: workspace.visibility.as_str().to_string(),
            owner_user_id: workspace.owner_user_id,
            archived: workspace.is_archived(),
            name: workspace.name,
            description: workspace.description,
        }
    }
}

fn parse_visibility(value: &str) -> Result<WorkspaceVisibility, ApiError> {
    WorkspaceVisibility::parse(value).ok_or_else(|| {
        ApiError(CoreError::validation(format!(
            "Unknown visibility '{value}'"
        )))
    })
}

fn parse_role(value: Option<&str>) -> Result<AclRole, ApiError> {
    match value {
        None => Ok(AclRole::Viewer),
        Some(raw) => AclRole::parse(&raw.to_uppercase())
            .ok_or_else(|| ApiError(CoreError::validation(format!("Unknown ACL role '{raw}'")))),
    }
}

pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateWorkspaceRequest>,
) -> ApiResult<Json<WorkspaceView>> {
    let actor = actor_from_headers(&headers)?;
    let visibility = match request.visibility.as_deref() {
        Some(raw) => parse_visibility(raw)?,
        None => WorkspaceVisibility::Private,
    };

    let workspace = state
        .workspaces
        .create(
            &actor,
            CreateWorkspaceInput {
                name: request.name,
                description: request.description,
                visibility,
                owner_user_id: request.owner_user_id,
            },
        )
        .await?;
    Ok(Json(workspace.into()))
}

pub async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<WorkspaceView>>> {
    let actor = actor_from_headers(&headers)?;
    let workspaces = state.workspaces.list(&actor).await?;
    Ok(Json(workspaces.into_iter().map(Into::into).collect()))
}

pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<WorkspaceView>> {
    let actor = actor_from_headers(&headers)?;
    let workspace = state.workspaces.get(&actor, workspace_id).await?;
    Ok(Json(workspace.into()))
}

pub async fn update_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(request): Json<UpdateWorkspaceRequest>,
) -> ApiResult<Json<WorkspaceView>> {
    let actor = actor_from_headers(&headers)?;
    let visibility = request
        .visibility
        .as_deref()
        .map(parse_visibility)
        .transpose()?;

    let workspace = state
        .workspaces
        .update(
            &actor,
            workspace_id,
            request.name.as_deref(),
            request.description.as_deref(),
            visibility,
        )
        .await?;
    Ok(Json(workspace.into()))
}

pub async fn archive_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    state.workspaces.archive(&actor, workspace_id).await?;
    Ok(Json(serde_json::json!({ "archived": true })))
}

pub async fn publish_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<WorkspaceView>> {
    let actor = actor_from_headers(&headers)?;
    let workspace = state.workspaces.publish(&actor, workspace_id).await?;
    Ok(Json(workspace.into()))
}

pub async fn share_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(request): Json<ShareRequest>,
) -> ApiResult<Json<WorkspaceView>> {
    let actor = actor_from_headers(&headers)?;

    let mut entries = Vec::with_capacity(request.entries.len());
    for entry in &request.entries {
        entries.push((entry.user_id, parse_role(entry.role.as_deref())?));
    }

    let workspace = state
        .workspaces
        .share(&actor, workspace_id, &entries)
        .await?;
    Ok(Json(workspace.into()))
}

pub async fn list_acl(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let entries = state.workspaces.list_acl(&actor, workspace_id).await?;

    let body: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "user_id": entry.user_id,
                "role": entry.role.as_str(),
                "granted_by": entry.granted_by,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "entries": body })))
}

pub async fn grant_acl(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(request): Json<GrantRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let role = parse_role(request.role.as_deref())?;
    state
        .workspaces
        .grant_acl(&actor, workspace_id, request.user_id, role)
        .await?;
    Ok(Json(serde_json::json!({ "granted": true })))
}

pub async fn revoke_acl(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let revoked = state
        .workspaces
        .revoke_acl(&actor, workspace_id, user_id)
        .await?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
