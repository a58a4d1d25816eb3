//! Conversation turn domain type and the turn-log trait.
//!
//! A `Turn` is one message (user or assistant) in a per-user history.
//! Turns are append-only and immutable once written; recall order is
//! defined by the write timestamp.

use crate::error::HistoryError;
use crate::message::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single conversation turn as persisted in the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Which user this turn belongs to
    pub user_id: String,

    /// Unix timestamp (seconds) of the write
    pub ts: i64,

    /// User or assistant
    pub role: Role,

    /// The message text
    pub content: String,

    /// Which embedding model produced `embedding`, when present.
    ///
    /// Vectors from a retired embedding model are never compared against
    /// a query embedded with a different model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Embedding of the content; present only on user turns that were
    /// embedded at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Turn {
    /// A user turn without an embedding.
    pub fn user(user_id: impl Into<String>, content: impl Into<String>, ts: i64) -> Self {
        Self {
            user_id: user_id.into(),
            ts,
            role: Role::User,
            content: content.into(),
            embedding_model: None,
            embedding: None,
        }
    }

    /// An assistant turn.
    pub fn assistant(user_id: impl Into<String>, content: impl Into<String>, ts: i64) -> Self {
        Self {
            user_id: user_id.into(),
            ts,
            role: Role::Assistant,
            content: content.into(),
            embedding_model: None,
            embedding: None,
        }
    }

    /// Attach an embedding tagged with the model that produced it.
    pub fn with_embedding(mut self, model: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embedding_model = Some(model.into());
        self.embedding = Some(embedding);
        self
    }
}

/// The durable per-user turn log.
///
/// Implementations: SQLite (production), in-memory (testing).
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append a turn. Durable write; never rejects a well-formed turn.
    async fn append(&self, turn: Turn) -> std::result::Result<(), HistoryError>;

    /// Recall up to `turns` user/assistant pairs (`2 * turns` rows) for a
    /// user, ordered oldest to newest.
    async fn recall(
        &self,
        user_id: &str,
        turns: usize,
    ) -> std::result::Result<Vec<Turn>, HistoryError>;
}
