//! In-process conversation store: bounded FIFO history per conversation id.
//!
//! Append order is the order of successful `append` calls; the per-entry
//! DashMap shard lock gives strict per-conversation mutual exclusion.

use std::collections::VecDeque;

use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{ConversationMessage, MessageRole};

pub struct ConversationStore {
    conversations: DashMap<Uuid, VecDeque<ConversationMessage>>,
    max_messages: usize,
}

impl ConversationStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Create an empty conversation and return its id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.conversations.insert(id, VecDeque::new());
        id
    }

    pub fn exists(&self, id: Uuid) -> bool {
        self.conversations.contains_key(&id)
    }

    /// Append a message, creating the conversation on demand. Oldest
    /// messages are evicted FIFO beyond the cap.
    pub fn append(&self, id: Uuid, message: ConversationMessage) {
        let mut entry = self.conversations.entry(id).or_default();
        entry.push_back(message);
        while entry.len() > self.max_messages {
            entry.pop_front();
        }
    }

    /// Tail of the history: the last `limit` messages, or all of them when
    /// `limit` is absent or non-positive.
    pub fn get(&self, id: Uuid, limit: Option<i64>) -> Vec<ConversationMessage> {
        let Some(entry) = self.conversations.get(&id) else {
            return Vec::new();
        };

        let messages: Vec<ConversationMessage> = entry.iter().cloned().collect();
        match limit {
            Some(n) if n > 0 => {
                let n = n as usize;
                let skip = messages.len().saturating_sub(n);
                messages.into_iter().skip(skip).collect()
            }
            _ => messages,
        }
    }

    pub fn clear(&self, id: Uuid) -> bool {
        self.conversations.remove(&id).is_some()
    }

    /// Resolve an existing conversation id or create a fresh one.
    pub fn resolve_or_create(&self, id: Option<Uuid>) -> Uuid {
        match id {
            Some(id) if self.exists(id) => id,
            _ => self.create(),
        }
    }
}

/// Labeled transcript for the LLM: prior turns plus the current query.
pub fn format_conversation_query(history: &[ConversationMessage], current_query: &str) -> String {
    if history.is_empty() {
        return current_query.to_string();
    }

    let mut parts: Vec<String> = Vec::with_capacity(history.len() + 1);
    for message in history {
        let label = match message.role {
            MessageRole::User => "Usuario",
            MessageRole::Assistant => "Asistente",
        };
        parts.push(format!("{label}: {}", message.content));
    }
    parts.push(format!("Usuario: {current_query}"));
    parts.join("\n")
}
