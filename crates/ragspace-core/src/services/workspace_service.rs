//! Workspace lifecycle and sharing operations exposed to the API layer.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::policy::can_read_workspace;
use crate::domain::{
    AclEntry, AclRole, Actor, UserRole, Workspace, WorkspaceVisibility,
};
use crate::error::{CoreError, CoreResult};
use crate::ports::repositories::WorkspaceFilter;
use crate::ports::{AclRepository, WorkspaceRepository};

use super::workspace_access::{
    resolve_workspace_for_acl, resolve_workspace_for_read, resolve_workspace_for_write,
};

#[derive(Debug, Clone)]
pub struct CreateWorkspaceInput {
    pub name: String,
    pub description: Option<String>,
    pub visibility: WorkspaceVisibility,
    pub owner_user_id: Option<Uuid>,
}

pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceRepository>,
    acl: Arc<dyn AclRepository>,
}

impl WorkspaceService {
    pub fn new(workspaces: Arc<dyn WorkspaceRepository>, acl: Arc<dyn AclRepository>) -> Self {
        Self { workspaces, acl }
    }

    /// Workspaces are created by admin actors; the owner defaults to the
    /// creating actor.
    pub async fn create(&self, actor: &Actor, input: CreateWorkspaceInput) -> CoreResult<Workspace> {
        if actor.role != Some(UserRole::Admin) {
            return Err(CoreError::forbidden("Only admins can create workspaces"));
        }

        let name = input.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("workspace name is required"));
        }

        let owner = input.owner_user_id.or(actor.user_id);
        if let Some(owner) = owner {
            if self
                .workspaces
                .get_workspace_by_owner_and_name(owner, name)
                .await?
                .is_some()
            {
                return Err(CoreError::conflict(format!(
                    "Workspace name '{name}' already exists for this owner"
                )));
            }
        }

        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: input.description,
            visibility: input.visibility,
            owner_user_id: owner,
            archived_at: None,
            created_at: None,
            updated_at: None,
        };
        self.workspaces.create_workspace(&workspace).await?;

        info!(workspace_id = %workspace.id, "workspace created");
        self.workspaces
            .get_workspace(workspace.id)
            .await?
            .ok_or_else(|| CoreError::database("workspace vanished after create"))
    }

    pub async fn get(&self, actor: &Actor, workspace_id: Uuid) -> CoreResult<Workspace> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await
    }

    /// Everything the actor can reach: admin sees all; an employee sees
    /// owned, org-readable, and ACL-shared workspaces.
    pub async fn list(&self, actor: &Actor) -> CoreResult<Vec<Workspace>> {
        if actor.role == Some(UserRole::Admin) {
            return self.workspaces.list_workspaces(WorkspaceFilter::All, false).await;
        }

        let Some(user_id) = actor.user_id else {
            return Err(CoreError::forbidden("Actor has no identity"));
        };

        let mut out = self
            .workspaces
            .list_workspaces(WorkspaceFilter::Owner(user_id), false)
            .await?;

        let org_read = self
            .workspaces
            .list_workspaces(
                WorkspaceFilter::Visibility(WorkspaceVisibility::OrgRead),
                false,
            )
            .await?;
        for workspace in org_read {
            if !out.iter().any(|w| w.id == workspace.id) {
                out.push(workspace);
            }
        }

        for workspace_id in self.acl.list_workspaces_for_user(user_id).await? {
            if out.iter().any(|w| w.id == workspace_id) {
                continue;
            }
            if let Some(workspace) = self.workspaces.get_workspace(workspace_id).await? {
                if workspace.archived_at.is_none()
                    && can_read_workspace(&workspace, Some(actor), Some(&[user_id]))
                {
                    out.push(workspace);
                }
            }
        }

        Ok(out)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        visibility: Option<WorkspaceVisibility>,
    ) -> CoreResult<Workspace> {
        let workspace =
            resolve_workspace_for_write(&self.workspaces, workspace_id, Some(actor)).await?;

        if let (Some(new_name), Some(owner)) = (name, workspace.owner_user_id) {
            if new_name.to_lowercase() != workspace.name.to_lowercase() {
                if let Some(existing) = self
                    .workspaces
                    .get_workspace_by_owner_and_name(owner, new_name)
                    .await?
                {
                    if existing.id != workspace_id {
                        return Err(CoreError::conflict(format!(
                            "Workspace name '{new_name}' already exists for this owner"
                        )));
                    }
                }
            }
        }

        self.workspaces
            .update_workspace(workspace_id, name, description, visibility)
            .await?;
        self.workspaces
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workspace", workspace_id.to_string()))
    }

    /// Idempotent soft archive; cascades soft-delete to documents.
    pub async fn archive(&self, actor: &Actor, workspace_id: Uuid) -> CoreResult<()> {
        resolve_workspace_for_write(&self.workspaces, workspace_id, Some(actor)).await?;
        let archived = self.workspaces.archive_workspace(workspace_id).await?;
        if !archived {
            return Err(CoreError::not_found("Workspace", workspace_id.to_string()));
        }
        info!(%workspace_id, "workspace archived");
        Ok(())
    }

    /// Publish: make the workspace readable by every employee.
    pub async fn publish(&self, actor: &Actor, workspace_id: Uuid) -> CoreResult<Workspace> {
        self.update(
            actor,
            workspace_id,
            None,
            None,
            Some(WorkspaceVisibility::OrgRead),
        )
        .await
    }

    /// Share: switch to SHARED visibility and replace the ACL set.
    pub async fn share(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        entries: &[(Uuid, AclRole)],
    ) -> CoreResult<Workspace> {
        resolve_workspace_for_acl(&self.workspaces, workspace_id, Some(actor)).await?;

        self.workspaces
            .update_workspace(workspace_id, None, None, Some(WorkspaceVisibility::Shared))
            .await?;
        self.acl
            .replace_workspace_acl(workspace_id, entries, actor.user_id)
            .await?;

        info!(%workspace_id, entries = entries.len(), "workspace shared");
        self.workspaces
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workspace", workspace_id.to_string()))
    }

    pub async fn grant_acl(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        user_id: Uuid,
        role: AclRole,
    ) -> CoreResult<()> {
        resolve_workspace_for_acl(&self.workspaces, workspace_id, Some(actor)).await?;

        self.acl
            .grant_acl(&AclEntry {
                workspace_id,
                user_id,
                role,
                granted_by: actor.user_id,
                created_at: None,
            })
            .await
    }

    pub async fn revoke_acl(
        &self,
        actor: &Actor,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<bool> {
        resolve_workspace_for_acl(&self.workspaces, workspace_id, Some(actor)).await?;

        self.acl.revoke_acl(workspace_id, user_id).await
    }

    pub async fn list_acl(&self, actor: &Actor, workspace_id: Uuid) -> CoreResult<Vec<AclEntry>> {
        resolve_workspace_for_read(&self.workspaces, &self.acl, workspace_id, Some(actor)).await?;
        self.acl.list_workspace_acl_entries(workspace_id).await
    }
}
