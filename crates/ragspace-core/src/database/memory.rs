//! In-memory implementation of the repository ports. Backs unit and
//! end-to-end tests, and lets the whole stack run without Postgres.
//! Semantics mirror the SQL adapters: workspace scoping, soft-delete
//! filtering, CAS transitions, atomic chunk replacement.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::status::StatusSet;
use crate::domain::{
    AclEntry, AclRole, Chunk, Document, DocumentStatus, Workspace, WorkspaceVisibility,
    EMBEDDING_DIMENSION,
};
use crate::error::{CoreError, CoreResult};
use crate::ports::repositories::{
    AclRepository, DocumentRepository, DocumentSort, WorkspaceFilter, WorkspaceRepository,
};
use crate::similarity::{cosine_similarity, mmr_rerank};

#[derive(Default)]
struct MemoryState {
    workspaces: HashMap<Uuid, Workspace>,
    acl: Vec<AclEntry>,
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, Vec<Chunk>>,
}

/// One shared store implementing all three repository ports.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn validate_embeddings(chunks: &[Chunk]) -> CoreResult<()> {
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.embedding.len() != EMBEDDING_DIMENSION {
                return Err(CoreError::validation(format!(
                    "Chunk {i} embedding has {} dimensions, expected {EMBEDDING_DIMENSION}",
                    chunk.embedding.len()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryStore {
    async fn create_workspace(&self, workspace: &Workspace) -> CoreResult<()> {
        let mut state = self.state.write();

        let duplicate = state.workspaces.values().any(|existing| {
            existing.owner_user_id == workspace.owner_user_id
                && existing.name.to_lowercase() == workspace.name.to_lowercase()
        });
        if duplicate {
            return Err(CoreError::conflict(format!(
                "Workspace name '{}' already exists for this owner",
                workspace.name
            )));
        }

        let mut stored = workspace.clone();
        let now = Utc::now();
        stored.created_at = stored.created_at.or(Some(now));
        stored.updated_at = stored.updated_at.or(Some(now));
        state.workspaces.insert(stored.id, stored);
        Ok(())
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> CoreResult<Option<Workspace>> {
        Ok(self.state.read().workspaces.get(&workspace_id).cloned())
    }

    async fn get_workspace_by_owner_and_name(
        &self,
        owner_user_id: Uuid,
        name: &str,
    ) -> CoreResult<Option<Workspace>> {
        let lowered = name.to_lowercase();
        Ok(self
            .state
            .read()
            .workspaces
            .values()
            .find(|ws| {
                ws.owner_user_id == Some(owner_user_id) && ws.name.to_lowercase() == lowered
            })
            .cloned())
    }

    async fn list_workspaces(
        &self,
        filter: WorkspaceFilter,
        include_archived: bool,
    ) -> CoreResult<Vec<Workspace>> {
        let state = self.state.read();
        let mut out: Vec<Workspace> = state
            .workspaces
            .values()
            .filter(|ws| include_archived || ws.archived_at.is_none())
            .filter(|ws| match &filter {
                WorkspaceFilter::Owner(owner) => ws.owner_user_id == Some(*owner),
                WorkspaceFilter::Visibility(visibility) => ws.visibility == *visibility,
                WorkspaceFilter::All => true,
            })
            .cloned()
            .collect();

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_workspace(
        &self,
        workspace_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        visibility: Option<WorkspaceVisibility>,
    ) -> CoreResult<bool> {
        let mut state = self.state.write();
        let Some(workspace) = state.workspaces.get_mut(&workspace_id) else {
            return Ok(false);
        };

        if let Some(name) = name {
            workspace.name = name.to_string();
        }
        if let Some(description) = description {
            workspace.description = Some(description.to_string());
        }
        if let Some(visibility) = visibility {
            workspace.visibility = visibility;
        }
        workspace.updated_at = Some(Utc::now());
        Ok(true)
    }

    async fn archive_workspace(&self, workspace_id: Uuid) -> CoreResult<bool> {
        let mut state = self.state.write();
        let Some(workspace) = state.workspaces.get_mut(&workspace_id) else {
            return Ok(false);
        };

        if workspace.archived_at.is_some() {
            return Ok(true);
        }

        let now = Utc::now();
        workspace.archived_at = Some(now);
        workspace.updated_at = Some(now);

        for document in state.documents.values_mut() {
            if document.workspace_id == workspace_id && document.deleted_at.is_none() {
                document.deleted_at = Some(now);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl AclRepository for InMemoryStore {
    async fn list_workspace_acl(&self, workspace_id: Uuid) -> CoreResult<Vec<Uuid>> {
        Ok(self
            .list_workspace_acl_entries(workspace_id)
            .await?
            .into_iter()
            .map(|entry| entry.user_id)
            .collect())
    }

    async fn list_workspace_acl_entries(&self, workspace_id: Uuid) -> CoreResult<Vec<AclEntry>> {
        let state = self.state.read();
        let mut entries: Vec<AclEntry> = state
            .acl
            .iter()
            .filter(|entry| entry.workspace_id == workspace_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.user_id.cmp(&b.user_id))
        });
        Ok(entries)
    }

    async fn replace_workspace_acl(
        &self,
        workspace_id: Uuid,
        entries: &[(Uuid, AclRole)],
        granted_by: Option<Uuid>,
    ) -> CoreResult<()> {
        let mut state = self.state.write();
        state.acl.retain(|entry| entry.workspace_id != workspace_id);

        let now = Utc::now();
        let mut seen: Vec<Uuid> = Vec::new();
        for (user_id, role) in entries {
            if seen.contains(user_id) {
                continue;
            }
            seen.push(*user_id);
            state.acl.push(AclEntry {
                workspace_id,
                user_id: *user_id,
                role: *role,
                granted_by,
                created_at: Some(now),
            });
        }
        Ok(())
    }

    async fn grant_acl(&self, entry: &AclEntry) -> CoreResult<()> {
        let mut state = self.state.write();
        state
            .acl
            .retain(|e| !(e.workspace_id == entry.workspace_id && e.user_id == entry.user_id));

        let mut stored = entry.clone();
        stored.created_at = stored.created_at.or(Some(Utc::now()));
        state.acl.push(stored);
        Ok(())
    }

    async fn revoke_acl(&self, workspace_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        let mut state = self.state.write();
        let before = state.acl.len();
        state
            .acl
            .retain(|e| !(e.workspace_id == workspace_id && e.user_id == user_id));
        Ok(state.acl.len() < before)
    }

    async fn list_workspaces_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Uuid>> {
        let state = self.state.read();
        let mut entries: Vec<&AclEntry> = state
            .acl
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.workspace_id.cmp(&b.workspace_id))
        });
        Ok(entries.into_iter().map(|e| e.workspace_id).collect())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn save_document(&self, document: &Document) -> CoreResult<()> {
        let mut state = self.state.write();
        let mut stored = document.clone();
        stored.created_at = stored.created_at.or(Some(Utc::now()));
        state.documents.insert(stored.id, stored);
        Ok(())
    }

    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> CoreResult<()> {
        Self::validate_embeddings(chunks)?;

        let mut state = self.state.write();
        let mut stored = document.clone();
        stored.created_at = stored.created_at.or(Some(Utc::now()));
        state.documents.insert(stored.id, stored);
        state.chunks.insert(document.id, chunks.to_vec());
        Ok(())
    }

    async fn save_chunks(
        &self,
        document_id: Uuid,
        chunks: &[Chunk],
        workspace_id: Uuid,
    ) -> CoreResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        Self::validate_embeddings(chunks)?;

        let mut state = self.state.write();
        let owned = state
            .documents
            .get(&document_id)
            .is_some_and(|d| d.workspace_id == workspace_id && d.deleted_at.is_none());
        if !owned {
            return Err(CoreError::not_found(
                "Document",
                format!("{document_id} in workspace {workspace_id}"),
            ));
        }

        state
            .chunks
            .entry(document_id)
            .or_default()
            .extend(chunks.iter().cloned());
        Ok(())
    }

    async fn delete_chunks_for_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<u64> {
        let mut state = self.state.write();
        let owned = state
            .documents
            .get(&document_id)
            .is_some_and(|d| d.workspace_id == workspace_id);
        if !owned {
            return Ok(0);
        }
        let removed = state
            .chunks
            .remove(&document_id)
            .map(|chunks| chunks.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn count_chunks_for_document(&self, document_id: Uuid) -> CoreResult<u64> {
        Ok(self
            .state
            .read()
            .chunks
            .get(&document_id)
            .map(|chunks| chunks.len() as u64)
            .unwrap_or(0))
    }

    async fn get_document(&self, document_id: Uuid) -> CoreResult<Option<Document>> {
        Ok(self
            .state
            .read()
            .documents
            .get(&document_id)
            .filter(|d| d.deleted_at.is_none())
            .cloned())
    }

    async fn get_document_in_workspace(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<Option<Document>> {
        Ok(self
            .state
            .read()
            .documents
            .get(&document_id)
            .filter(|d| d.workspace_id == workspace_id && d.deleted_at.is_none())
            .cloned())
    }

    async fn list_documents(
        &self,
        workspace_id: Uuid,
        sort: DocumentSort,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Document>> {
        let state = self.state.read();
        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.workspace_id == workspace_id && d.deleted_at.is_none())
            .cloned()
            .collect();

        match sort {
            DocumentSort::CreatedAtDesc => {
                documents.sort_by(|a, b| b.created_at.cmp(&a.created_at))
            }
            DocumentSort::CreatedAtAsc => documents.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            DocumentSort::TitleAsc => documents.sort_by(|a, b| a.title.cmp(&b.title)),
            DocumentSort::TitleDesc => documents.sort_by(|a, b| b.title.cmp(&a.title)),
        }

        Ok(documents
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_document_file_metadata<'a>(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
        file_name: Option<&'a str>,
        mime_type: Option<&'a str>,
        storage_key: Option<&'a str>,
        uploaded_by_user_id: Option<Uuid>,
        status: Option<DocumentStatus>,
        error_message: Option<&'a str>,
    ) -> CoreResult<bool> {
        let mut state = self.state.write();
        let Some(document) = state
            .documents
            .get_mut(&document_id)
            .filter(|d| d.workspace_id == workspace_id)
        else {
            return Ok(false);
        };

        document.file_name = file_name.map(str::to_string);
        document.mime_type = mime_type.map(str::to_string);
        document.storage_key = storage_key.map(str::to_string);
        document.uploaded_by_user_id = uploaded_by_user_id;
        document.status = status;
        document.error_message = error_message.map(str::to_string);
        Ok(true)
    }

    async fn transition_document_status(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
        from: StatusSet,
        to: DocumentStatus,
        error_message: Option<&str>,
    ) -> CoreResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.write();
        let Some(document) = state
            .documents
            .get_mut(&document_id)
            .filter(|d| d.workspace_id == workspace_id)
        else {
            return Ok(false);
        };

        if !from.contains(&document.status) {
            return Ok(false);
        }

        document.status = Some(to);
        document.error_message = error_message.map(str::to_string);
        Ok(true)
    }

    async fn soft_delete_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<bool> {
        let mut state = self.state.write();
        let Some(document) = state
            .documents
            .get_mut(&document_id)
            .filter(|d| d.workspace_id == workspace_id && d.deleted_at.is_none())
        else {
            return Ok(false);
        };
        document.deleted_at = Some(Utc::now());
        Ok(true)
    }

    async fn find_documents_in_status(
        &self,
        status: DocumentStatus,
        limit: i64,
    ) -> CoreResult<Vec<Document>> {
        let state = self.state.read();
        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.status == Some(status) && d.deleted_at.is_none())
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        documents.truncate(limit.max(0) as usize);
        Ok(documents)
    }

    async fn find_similar_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>> {
        let state = self.state.read();

        let mut scored: Vec<Chunk> = state
            .chunks
            .iter()
            .filter(|(document_id, _)| {
                state
                    .documents
                    .get(document_id)
                    .is_some_and(|d| d.workspace_id == workspace_id && d.deleted_at.is_none())
            })
            .flat_map(|(_, chunks)| chunks.iter())
            .map(|chunk| {
                let mut scored = chunk.clone();
                scored.similarity = Some(cosine_similarity(embedding, &chunk.embedding));
                scored
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn find_similar_chunks_mmr(
        &self,
        embedding: &[f32],
        top_k: usize,
        fetch_k: usize,
        lambda_mult: f32,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>> {
        let candidates = self
            .find_similar_chunks(embedding, fetch_k.max(top_k * 2), workspace_id)
            .await?;
        Ok(mmr_rerank(embedding, candidates, top_k, lambda_mult))
    }
}
