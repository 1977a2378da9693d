use async_trait::async_trait;
use pgvector::Vector;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::status::StatusSet;
use crate::domain::{Chunk, Document, DocumentStatus, EMBEDDING_DIMENSION};
use crate::error::{CoreError, CoreResult};
use crate::ports::repositories::{DocumentRepository, DocumentSort};
use crate::similarity::mmr_rerank;

use super::models::{ChunkRow, DocumentRow};
use super::pool::DbPool;

const DOCUMENT_COLUMNS: &str = "id, workspace_id, title, source, metadata, tags, allowed_roles, \
     status, error_message, file_name, mime_type, storage_key, uploaded_by_user_id, \
     created_at, deleted_at";

pub struct PostgresDocumentRepository {
    pool: DbPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
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

    async fn insert_chunks_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        document_id: Uuid,
        chunks: &[Chunk],
    ) -> CoreResult<()> {
        for chunk in chunks {
            sqlx::query(
                r#"INSERT INTO chunks (id, document_id, chunk_index, content, embedding)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(chunk.chunk_id)
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(Vector::from(chunk.embedding.clone()))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn upsert_document_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        document: &Document,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO documents
                   (id, workspace_id, title, source, metadata, tags, allowed_roles, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
               ON CONFLICT (id) DO UPDATE
               SET workspace_id = EXCLUDED.workspace_id,
                   title = EXCLUDED.title,
                   source = EXCLUDED.source,
                   metadata = EXCLUDED.metadata,
                   tags = EXCLUDED.tags,
                   allowed_roles = EXCLUDED.allowed_roles"#,
        )
        .bind(document.id)
        .bind(document.workspace_id)
        .bind(&document.title)
        .bind(&document.source)
        .bind(&document.metadata)
        .bind(&document.tags)
        .bind(&document.allowed_roles)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn save_document(&self, document: &Document) -> CoreResult<()> {
        let mut tx = self.pool.get_pool().begin().await?;
        Self::upsert_document_tx(&mut tx, document).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> CoreResult<()> {
        Self::validate_embeddings(chunks)?;

        let mut tx = self.pool.get_pool().begin().await?;
        Self::upsert_document_tx(&mut tx, document).await?;
        Self::insert_chunks_tx(&mut tx, document.id, chunks).await?;
        tx.commit().await?;

        info!(document_id = %document.id, chunks = chunks.len(), "atomic save completed");
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

        let mut tx = self.pool.get_pool().begin().await?;

        let owned: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM documents \
             WHERE id = $1 AND workspace_id = $2 AND deleted_at IS NULL",
        )
        .bind(document_id)
        .bind(workspace_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            return Err(CoreError::not_found(
                "Document",
                format!("{document_id} in workspace {workspace_id}"),
            ));
        }

        Self::insert_chunks_tx(&mut tx, document_id, chunks).await?;
        tx.commit().await?;

        debug!(%document_id, chunks = chunks.len(), "saved chunks");
        Ok(())
    }

    async fn delete_chunks_for_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"DELETE FROM chunks c
               USING documents d
               WHERE c.document_id = d.id
                 AND c.document_id = $1
                 AND d.workspace_id = $2"#,
        )
        .bind(document_id)
        .bind(workspace_id)
        .execute(self.pool.get_pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_chunks_for_document(&self, document_id: Uuid) -> CoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM chunks WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(count as u64)
    }

    async fn get_document(&self, document_id: Uuid) -> CoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(document_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(row.map(DocumentRow::into_domain))
    }

    async fn get_document_in_workspace(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE id = $1 AND workspace_id = $2 AND deleted_at IS NULL"
        ))
        .bind(document_id)
        .bind(workspace_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(row.map(DocumentRow::into_domain))
    }

    async fn list_documents(
        &self,
        workspace_id: Uuid,
        sort: DocumentSort,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Document>> {
        let order_by = match sort {
            DocumentSort::CreatedAtDesc => "created_at DESC NULLS LAST",
            DocumentSort::CreatedAtAsc => "created_at ASC NULLS LAST",
            DocumentSort::TitleAsc => "title ASC NULLS LAST",
            DocumentSort::TitleDesc => "title DESC NULLS LAST",
        };

        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE workspace_id = $1 AND deleted_at IS NULL \
             ORDER BY {order_by} \
             LIMIT $2 OFFSET $3"
        ))
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(rows.into_iter().map(DocumentRow::into_domain).collect())
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
        let result = sqlx::query(
            r#"UPDATE documents
               SET file_name = $3,
                   mime_type = $4,
                   storage_key = $5,
                   uploaded_by_user_id = $6,
                   status = $7,
                   error_message = $8
               WHERE id = $1 AND workspace_id = $2"#,
        )
        .bind(document_id)
        .bind(workspace_id)
        .bind(file_name)
        .bind(mime_type)
        .bind(storage_key)
        .bind(uploaded_by_user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(error_message)
        .execute(self.pool.get_pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn transition_document_status<'a>(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
        from: StatusSet,
        to: DocumentStatus,
        error_message: Option<&'a str>,
    ) -> CoreResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let include_null = from.iter().any(Option::is_none);
        let allowed: Vec<String> = from
            .iter()
            .flatten()
            .map(|status| status.as_str().to_string())
            .collect();

        let mut query = String::from(
            "UPDATE documents SET status = $1, error_message = $2 \
             WHERE id = $3 AND workspace_id = $4",
        );
        if !allowed.is_empty() && include_null {
            query.push_str(" AND (status = ANY($5) OR status IS NULL)");
        } else if !allowed.is_empty() {
            query.push_str(" AND status = ANY($5)");
        } else if include_null {
            query.push_str(" AND status IS NULL");
        }

        let mut q = sqlx::query(&query)
            .bind(to.as_str())
            .bind(error_message)
            .bind(document_id)
            .bind(workspace_id);
        if !allowed.is_empty() {
            q = q.bind(allowed);
        }

        let result = q.execute(self.pool.get_pool()).await?;
        let changed = result.rows_affected() > 0;

        debug!(
            %document_id,
            to = to.as_str(),
            changed,
            "status transition"
        );
        Ok(changed)
    }

    async fn soft_delete_document(
        &self,
        document_id: Uuid,
        workspace_id: Uuid,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET deleted_at = NOW() \
             WHERE id = $1 AND workspace_id = $2 AND deleted_at IS NULL",
        )
        .bind(document_id)
        .bind(workspace_id)
        .execute(self.pool.get_pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_documents_in_status(
        &self,
        status: DocumentStatus,
        limit: i64,
    ) -> CoreResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE status = $1 AND deleted_at IS NULL \
             ORDER BY created_at ASC NULLS LAST \
             LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(rows.into_iter().map(DocumentRow::into_domain).collect())
    }

    async fn find_similar_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>> {
        let vector = Vector::from(embedding.to_vec());

        let rows = sqlx::query_as::<_, ChunkRow>(
            r#"SELECT
                   c.id,
                   c.document_id,
                   c.chunk_index,
                   c.content,
                   c.embedding,
                   (1 - (c.embedding <=> $1))::float8 AS score
               FROM chunks c
               JOIN documents d ON d.id = c.document_id
               WHERE d.deleted_at IS NULL
                 AND d.workspace_id = $2
               ORDER BY c.embedding <=> $1
               LIMIT $3"#,
        )
        .bind(&vector)
        .bind(workspace_id)
        .bind(top_k as i64)
        .fetch_all(self.pool.get_pool())
        .await?;

        debug!(found = rows.len(), %workspace_id, "similarity search");
        Ok(rows.into_iter().map(ChunkRow::into_domain).collect())
    }

    async fn find_similar_chunks_mmr(
        &self,
        embedding: &[f32],
        top_k: usize,
        fetch_k: usize,
        lambda_mult: f32,
        workspace_id: Uuid,
    ) -> CoreResult<Vec<Chunk>> {
        // Over-fetch candidates, then re-rank in process.
        let candidates = self
            .find_similar_chunks(embedding, fetch_k.max(top_k * 2), workspace_id)
            .await?;

        Ok(mmr_rerank(embedding, candidates, top_k, lambda_mult))
    }
}
