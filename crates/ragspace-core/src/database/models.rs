//! Row types for sqlx, converted to domain entities at the repository edge.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    AclEntry, AclRole, Chunk, Document, DocumentStatus, Workspace, WorkspaceVisibility,
};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub visibility: String,
    pub owner_user_id: Option<Uuid>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkspaceRow {
    pub fn into_domain(self) -> CoreResult<Workspace> {
        let visibility = WorkspaceVisibility::parse(&self.visibility).ok_or_else(|| {
            CoreError::database(format!("Unknown workspace visibility '{}'", self.visibility))
        })?;
        Ok(Workspace {
            id: self.id,
            name: self.name,
            description: self.description,
            visibility,
            owner_user_id: self.owner_user_id,
            archived_at: self.archived_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AclEntryRow {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub granted_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AclEntryRow {
    pub fn into_domain(self) -> CoreResult<AclEntry> {
        let role = AclRole::parse(&self.role)
            .ok_or_else(|| CoreError::database(format!("Unknown ACL role '{}'", self.role)))?;
        Ok(AclEntry {
            workspace_id: self.workspace_id,
            user_id: self.user_id,
            role,
            granted_by: self.granted_by,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub status: Option<String>,
    pub error_message: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub storage_key: Option<String>,
    pub uploaded_by_user_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    pub fn into_domain(self) -> Document {
        Document {
            id: self.id,
            workspace_id: self.workspace_id,
            title: self.title,
            source: self.source,
            metadata: self.metadata,
            tags: self.tags,
            allowed_roles: self.allowed_roles,
            status: self.status.as_deref().and_then(DocumentStatus::parse),
            error_message: self.error_message,
            file_name: self.file_name,
            mime_type: self.mime_type,
            storage_key: self.storage_key,
            uploaded_by_user_id: self.uploaded_by_user_id,
            created_at: self.created_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Vector,
    pub score: Option<f64>,
}

impl ChunkRow {
    pub fn into_domain(self) -> Chunk {
        Chunk {
            chunk_id: self.id,
            document_id: self.document_id,
            chunk_index: self.chunk_index,
            content: self.content,
            embedding: self.embedding.to_vec(),
            similarity: self.score.map(|s| s as f32),
        }
    }
}
