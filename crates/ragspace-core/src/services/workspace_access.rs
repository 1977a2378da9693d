//! Shared read/write resolution: load the workspace, load the ACL only when
//! the visibility requires it, and apply the pure policy.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::policy::{can_manage_acl, can_read_workspace, can_write_workspace};
use crate::domain::{Actor, Workspace, WorkspaceVisibility};
use crate::error::{CoreError, CoreResult};
use crate::ports::{AclRepository, WorkspaceRepository};

async fn load_workspace(
    workspaces: &Arc<dyn WorkspaceRepository>,
    workspace_id: Uuid,
) -> CoreResult<Workspace> {
    workspaces
        .get_workspace(workspace_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Workspace", workspace_id.to_string()))
}

/// Resolve a workspace for reading, enforcing the read policy.
/// The ACL is fetched only for SHARED workspaces.
pub async fn resolve_workspace_for_read(
    workspaces: &Arc<dyn WorkspaceRepository>,
    acl: &Arc<dyn AclRepository>,
    workspace_id: Uuid,
    actor: Option<&Actor>,
) -> CoreResult<Workspace> {
    let workspace = load_workspace(workspaces, workspace_id).await?;

    let shared_user_ids = if workspace.visibility == WorkspaceVisibility::Shared {
        Some(acl.list_workspace_acl(workspace_id).await?)
    } else {
        None
    };

    if !can_read_workspace(&workspace, actor, shared_user_ids.as_deref()) {
        return Err(CoreError::forbidden(format!(
            "Actor cannot read workspace {workspace_id}"
        )));
    }

    Ok(workspace)
}

/// Resolve a workspace for writing, enforcing the write policy.
pub async fn resolve_workspace_for_write(
    workspaces: &Arc<dyn WorkspaceRepository>,
    workspace_id: Uuid,
    actor: Option<&Actor>,
) -> CoreResult<Workspace> {
    let workspace = load_workspace(workspaces, workspace_id).await?;

    if !can_write_workspace(&workspace, actor) {
        return Err(CoreError::forbidden(format!(
            "Actor cannot write workspace {workspace_id}"
        )));
    }

    Ok(workspace)
}

/// Resolve a workspace for ACL management (share, grant, revoke).
pub async fn resolve_workspace_for_acl(
    workspaces: &Arc<dyn WorkspaceRepository>,
    workspace_id: Uuid,
    actor: Option<&Actor>,
) -> CoreResult<Workspace> {
    let workspace = load_workspace(workspaces, workspace_id).await?;

    if !can_manage_acl(&workspace, actor) {
        return Err(CoreError::forbidden(format!(
            "Actor cannot manage the ACL of workspace {workspace_id}"
        )));
    }

    Ok(workspace)
}
