//! The ask flow: authorize, thread conversation history, retrieve, and
//! answer, synchronously or as a pull-based event stream.
//!
//! Context-only policy: when retrieval finds nothing, the canonical fallback
//! is returned and the model is never called.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::domain::{Actor, Chunk, ConversationMessage};
use crate::error::{CoreError, CoreResult};
use crate::ports::{AclRepository, LlmProvider, WorkspaceRepository};
use crate::retry::RetryPolicy;

use super::conversation::{format_conversation_query, ConversationStore};
use super::retrieval::{RetrievalPipeline, RetrievalRequest, RetrievalResult};
use super::workspace_access::resolve_workspace_for_read;

const SOURCE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AskRequest {
    pub workspace_id: Uuid,
    pub actor: Actor,
    pub query: String,
    pub top_k: Option<i64>,
    pub use_mmr: Option<bool>,
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    /// Content preview, capped at 200 characters.
    pub content: String,
    pub similarity: Option<f32>,
}

impl SourceRef {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            document_id: chunk.document_id,
            content: chunk.content.chars().take(SOURCE_PREVIEW_CHARS).collect(),
            similarity: chunk.similarity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub conversation_id: Uuid,
    pub chunks_found: usize,
}

/// Stream envelope. Delivery is ordered: one `Sources`, then tokens, then
/// exactly one terminal `Done` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnswerEvent {
    Sources {
        sources: Vec<SourceRef>,
        conversation_id: Uuid,
    },
    Token {
        token: String,
    },
    Done {
        answer: String,
        conversation_id: Uuid,
    },
    Error {
        error: String,
    },
}

pub type AnswerEventStream = Pin<Box<dyn Stream<Item = AnswerEvent> + Send>>;

pub struct AnswerUseCase {
    workspaces: Arc<dyn WorkspaceRepository>,
    acl: Arc<dyn AclRepository>,
    retrieval: Arc<RetrievalPipeline>,
    llm: Arc<dyn LlmProvider>,
    conversations: Arc<ConversationStore>,
    retry: RetryPolicy,
    config: RagConfig,
}

struct PreparedAsk {
    conversation_id: Uuid,
    transcript_query: String,
    retrieval: RetrievalResult,
}

impl AnswerUseCase {
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        acl: Arc<dyn AclRepository>,
        retrieval: Arc<RetrievalPipeline>,
        llm: Arc<dyn LlmProvider>,
        conversations: Arc<ConversationStore>,
        retry: RetryPolicy,
        config: RagConfig,
    ) -> Self {
        Self {
            workspaces,
            acl,
            retrieval,
            llm,
            conversations,
            retry,
            config,
        }
    }

    fn effective_top_k(&self, requested: Option<i64>) -> i64 {
        let top_k = requested.unwrap_or(5);
        top_k.min(self.config.max_top_k as i64)
    }

    /// Steps shared by the sync and streaming paths: authorize, resolve the
    /// conversation, persist the user turn, and retrieve evidence.
    async fn prepare(&self, request: &AskRequest) -> CoreResult<PreparedAsk> {
        if request.query.trim().is_empty() {
            return Err(CoreError::validation("query is required"));
        }

        resolve_workspace_for_read(
            &self.workspaces,
            &self.acl,
            request.workspace_id,
            Some(&request.actor),
        )
        .await?;

        let conversation_id = self.conversations.resolve_or_create(request.conversation_id);
        let history = self.conversations.get(conversation_id, None);
        let transcript_query = format_conversation_query(&history, &request.query);

        // Pre-commit the user turn so streaming flows keep history even when
        // the client disconnects mid-answer.
        self.conversations
            .append(conversation_id, ConversationMessage::user(&request.query));

        let retrieval = self
            .retrieval
            .run(&RetrievalRequest {
                query: request.query.clone(),
                top_k: self.effective_top_k(request.top_k),
                use_mmr: request.use_mmr.unwrap_or(self.config.default_use_mmr),
                workspace_id: request.workspace_id,
            })
            .await?;

        Ok(PreparedAsk {
            conversation_id,
            transcript_query,
            retrieval,
        })
    }

    pub async fn ask(&self, request: AskRequest) -> CoreResult<AskAnswer> {
        let prepared = self.prepare(&request).await?;
        let conversation_id = prepared.conversation_id;

        if !prepared.retrieval.has_evidence() {
            let fallback = prepared.retrieval.fallback_answer().to_string();
            self.conversations
                .append(conversation_id, ConversationMessage::assistant(&fallback));
            return Ok(AskAnswer {
                answer: fallback,
                sources: Vec::new(),
                conversation_id,
                chunks_found: 0,
            });
        }

        let answer = self
            .retry
            .run("llm_generate", || {
                self.llm
                    .generate_answer(&prepared.transcript_query, &prepared.retrieval.context)
            })
            .await?;

        self.conversations
            .append(conversation_id, ConversationMessage::assistant(&answer));

        info!(
            workspace_id = %request.workspace_id,
            conversation_id = %conversation_id,
            chunks_found = prepared.retrieval.chunks_found,
            chunks_used = prepared.retrieval.chunks_used,
            answer_chars = answer.chars().count(),
            "answered query"
        );

        Ok(AskAnswer {
            answer,
            sources: prepared
                .retrieval
                .chunks
                .iter()
                .map(SourceRef::from_chunk)
                .collect(),
            conversation_id,
            chunks_found: prepared.retrieval.chunks_found,
        })
    }

    /// Streaming variant. Authorization and retrieval errors surface as
    /// `Err`; failures after the stream opens arrive as a terminal `Error`
    /// event. Dropping the stream stops token production; the assistant
    /// message is persisted only when `Done` is reached.
    pub async fn ask_stream(&self, request: AskRequest) -> CoreResult<AnswerEventStream> {
        let prepared = self.prepare(&request).await?;
        let conversation_id = prepared.conversation_id;
        let conversations = self.conversations.clone();

        if !prepared.retrieval.has_evidence() {
            let fallback = prepared.retrieval.fallback_answer().to_string();
            conversations.append(conversation_id, ConversationMessage::assistant(&fallback));

            let events = stream! {
                yield AnswerEvent::Sources {
                    sources: Vec::new(),
                    conversation_id,
                };
                yield AnswerEvent::Done {
                    answer: fallback,
                    conversation_id,
                };
            };
            return Ok(Box::pin(events));
        }

        let sources: Vec<SourceRef> = prepared
            .retrieval
            .chunks
            .iter()
            .map(SourceRef::from_chunk)
            .collect();

        // Retry applies to stream initiation only, never mid-stream.
        let mut token_stream = self
            .retry
            .run("llm_stream", || {
                self.llm
                    .generate_stream(&prepared.transcript_query, &prepared.retrieval.context)
            })
            .await?;

        let events = stream! {
            yield AnswerEvent::Sources {
                sources,
                conversation_id,
            };

            let mut full_answer = String::new();
            while let Some(item) = token_stream.next().await {
                match item {
                    Ok(token) => {
                        full_answer.push_str(&token);
                        yield AnswerEvent::Token { token };
                    }
                    Err(stream_error) => {
                        error!(error = %stream_error, "token stream failed");
                        yield AnswerEvent::Error {
                            error: stream_error.kind().to_string(),
                        };
                        return;
                    }
                }
            }

            conversations.append(
                conversation_id,
                ConversationMessage::assistant(&full_answer),
            );
            yield AnswerEvent::Done {
                answer: full_answer,
                conversation_id,
            };
        };

        Ok(Box::pin(events))
    }
}
