use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{AclEntry, AclRole};
use crate::error::CoreResult;
use crate::ports::AclRepository;

use super::models::AclEntryRow;
use super::pool::DbPool;

const ACL_COLUMNS: &str = "workspace_id, user_id, role, granted_by, created_at";

pub struct PostgresAclRepository {
    pool: DbPool,
}

impl PostgresAclRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AclRepository for PostgresAclRepository {
    async fn list_workspace_acl(&self, workspace_id: Uuid) -> CoreResult<Vec<Uuid>> {
        let user_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM workspace_acl \
             WHERE workspace_id = $1 \
             ORDER BY created_at ASC, user_id ASC",
        )
        .bind(workspace_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(user_ids)
    }

    async fn list_workspace_acl_entries(&self, workspace_id: Uuid) -> CoreResult<Vec<AclEntry>> {
        let rows = sqlx::query_as::<_, AclEntryRow>(&format!(
            "SELECT {ACL_COLUMNS} FROM workspace_acl \
             WHERE workspace_id = $1 \
             ORDER BY created_at ASC, user_id ASC"
        ))
        .bind(workspace_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter().map(AclEntryRow::into_domain).collect()
    }

    async fn replace_workspace_acl(
        &self,
        workspace_id: Uuid,
        entries: &[(Uuid, AclRole)],
        granted_by: Option<Uuid>,
    ) -> CoreResult<()> {
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query("DELETE FROM workspace_acl WHERE workspace_id = $1")
            .bind(workspace_id)
            .execute(&mut *tx)
            .await?;

        for (user_id, role) in entries {
            sqlx::query(
                r#"INSERT INTO workspace_acl (workspace_id, user_id, role, granted_by, created_at)
                   VALUES ($1, $2, $3, $4, NOW())
                   ON CONFLICT (workspace_id, user_id) DO UPDATE
                   SET role = EXCLUDED.role, granted_by = EXCLUDED.granted_by"#,
            )
            .bind(workspace_id)
            .bind(user_id)
            .bind(role.as_str())
            .bind(granted_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%workspace_id, entries = entries.len(), "replaced workspace acl");
        Ok(())
    }

    async fn grant_acl(&self, entry: &AclEntry) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO workspace_acl (workspace_id, user_id, role, granted_by, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               ON CONFLICT (workspace_id, user_id) DO UPDATE
               SET role = EXCLUDED.role, granted_by = EXCLUDED.granted_by"#,
        )
        .bind(entry.workspace_id)
        .bind(entry.user_id)
        .bind(entry.role.as_str())
        .bind(entry.granted_by)
        .execute(self.pool.get_pool())
        .await?;

        Ok(())
    }

    async fn revoke_acl(&self, workspace_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM workspace_acl WHERE workspace_id = $1 AND user_id = $2")
                .bind(workspace_id)
                .bind(user_id)
                .execute(self.pool.get_pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_workspaces_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Uuid>> {
        let workspace_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT workspace_id FROM workspace_acl \
             WHERE user_id = $1 \
             ORDER BY created_at ASC, workspace_id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(workspace_ids)
    }
}
