use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Workspace, WorkspaceVisibility};
use crate::error::{CoreError, CoreResult};
use crate::ports::repositories::{WorkspaceFilter, WorkspaceRepository};

use super::models::WorkspaceRow;
use super::pool::DbPool;

const WORKSPACE_COLUMNS: &str = "id, name, description, visibility, owner_user_id, \
     archived_at, created_at, updated_at";

pub struct PostgresWorkspaceRepository {
    pool: DbPool,
}

impl PostgresWorkspaceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(err: sqlx::Error, workspace: &Workspace) -> CoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return CoreError::conflict(format!(
                "Workspace name '{}' already exists for this owner",
                workspace.name
            ));
        }
    }
    CoreError::from(err)
}

#[async_trait]
impl WorkspaceRepository for PostgresWorkspaceRepository {
    async fn create_workspace(&self, workspace: &Workspace) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO workspaces
                   (id, name, description, visibility, owner_user_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, NOW(), NOW())"#,
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.description)
        .bind(workspace.visibility.as_str())
        .bind(workspace.owner_user_id)
        .execute(self.pool.get_pool())
        .await
        .map_err(|e| map_unique_violation(e, workspace))?;

        debug!(workspace_id = %workspace.id, "created workspace");
        Ok(())
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> CoreResult<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1"
        ))
        .bind(workspace_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        row.map(WorkspaceRow::into_domain).transpose()
    }

    async fn get_workspace_by_owner_and_name(
        &self,
        owner_user_id: Uuid,
        name: &str,
    ) -> CoreResult<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces \
             WHERE owner_user_id = $1 AND LOWER(name) = LOWER($2)"
        ))
        .bind(owner_user_id)
        .bind(name)
        .fetch_optional(self.pool.get_pool())
        .await?;

        row.map(WorkspaceRow::into_domain).transpose()
    }

    async fn list_workspaces(
        &self,
        filter: WorkspaceFilter,
        include_archived: bool,
    ) -> CoreResult<Vec<Workspace>> {
        let mut conditions: Vec<String> = Vec::new();
        if !include_archived {
            conditions.push("archived_at IS NULL".to_string());
        }

        let query = match &filter {
            WorkspaceFilter::Owner(_) => {
                conditions.push("owner_user_id = $1".to_string());
                format!(
                    "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE {} \
                     ORDER BY created_at DESC NULLS LAST",
                    conditions.join(" AND ")
                )
            }
            WorkspaceFilter::Visibility(_) => {
                conditions.push("visibility = $1".to_string());
                format!(
                    "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE {} \
                     ORDER BY created_at DESC NULLS LAST",
                    conditions.join(" AND ")
                )
            }
            WorkspaceFilter::All => {
                let where_clause = if conditions.is_empty() {
                    "TRUE".to_string()
                } else {
                    conditions.join(" AND ")
                };
                format!(
                    "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE {where_clause} \
                     ORDER BY created_at DESC NULLS LAST"
                )
            }
        };

        let mut q = sqlx::query_as::<_, WorkspaceRow>(&query);
        q = match &filter {
            WorkspaceFilter::Owner(owner) => q.bind(*owner),
            WorkspaceFilter::Visibility(visibility) => q.bind(visibility.as_str()),
            WorkspaceFilter::All => q,
        };

        let rows = q.fetch_all(self.pool.get_pool()).await?;
        rows.into_iter().map(WorkspaceRow::into_domain).collect()
    }

    async fn update_workspace(
        &self,
        workspace_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        visibility: Option<WorkspaceVisibility>,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"UPDATE workspaces
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   visibility = COALESCE($4, visibility),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(workspace_id)
        .bind(name)
        .bind(description)
        .bind(visibility.map(|v| v.as_str()))
        .execute(self.pool.get_pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn archive_workspace(&self, workspace_id: Uuid) -> CoreResult<bool> {
        let mut tx = self.pool.get_pool().begin().await?;

        let existing = sqlx::query("SELECT archived_at FROM workspaces WHERE id = $1")
            .bind(workspace_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(existing) = existing else {
            tx.rollback().await.ok();
            return Ok(false);
        };

        let already_archived: Option<chrono::DateTime<chrono::Utc>> =
            existing.try_get("archived_at")?;
        if already_archived.is_some() {
            tx.rollback().await.ok();
            return Ok(true);
        }

        sqlx::query(
            "UPDATE workspaces SET archived_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(workspace_id)
        .execute(&mut *tx)
        .await?;

        // Archive cascades a soft delete to the workspace's documents.
        sqlx::query(
            "UPDATE documents SET deleted_at = NOW() \
             WHERE workspace_id = $1 AND deleted_at IS NULL",
        )
        .bind(workspace_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%workspace_id, "archived workspace");
        Ok(true)
    }
}
