use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Expected embedding dimension, validated on every insert.
pub const EMBEDDING_DIMENSION: usize = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceVisibility {
    Private,
    OrgRead,
    Shared,
}

impl WorkspaceVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::OrgRead => "ORG_READ",
            Self::Shared => "SHARED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIVATE" => Some(Self::Private),
            "ORG_READ" => Some(Self::OrgRead),
            "SHARED" => Some(Self::Shared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub visibility: WorkspaceVisibility,
    pub owner_user_id: Option<Uuid>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclRole {
    Viewer,
    Editor,
}

impl AclRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "VIEWER",
            Self::Editor => "EDITOR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VIEWER" => Some(Self::Viewer),
            "EDITOR" => Some(Self::Editor),
            _ => None,
        }
    }
}

/// One ACL grant; primary key is (workspace_id, user_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclEntry {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: AclRole,
    pub granted_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Employee,
}

/// Transient authorization context. Never persisted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub role: Option<UserRole>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::Admin)
    }

    pub fn employee(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::Employee)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub status: Option<DocumentStatus>,
    pub error_message: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub storage_key: Option<String>,
    pub uploaded_by_user_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: Uuid, workspace_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            workspace_id,
            title: title.into(),
            source: None,
            metadata: serde_json::Value::Object(Default::default()),
            tags: Vec::new(),
            allowed_roles: Vec::new(),
            status: None,
            error_message: None,
            file_name: None,
            mime_type: None,
            storage_key: None,
            uploaded_by_user_id: None,
            created_at: None,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "READY" => Some(Self::Ready),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Cosine similarity to the query, attached by retrieval paths.
    pub similarity: Option<f32>,
}

impl Chunk {
    pub fn new(document_id: Uuid, chunk_index: i32, content: String, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            document_id,
            chunk_index,
            content,
            embedding,
            similarity: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
