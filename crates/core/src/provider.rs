//! Generation backend trait — the abstraction over the LLM collaborator.
//!
//! A `GenerationBackend` knows how to send a prompt sequence to a text
//! generation service and get an answer back, either as a complete message
//! or as a stream of content deltas. It also produces embeddings and
//! reports which models are installed.
//!
//! Implementations: Ollama (production), scripted mocks (tests).

use crate::error::ProviderError;
use crate::message::PromptMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling and lifecycle options for a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature. Grounded QA wants a fixed, low value.
    pub temperature: f32,

    /// Hint to the backend to keep the model resident between requests.
    /// An optimization, not a correctness requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { temperature: 0.2, keep_alive: None }
    }
}

/// An incremental fragment of a streamed chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Partial content
    #[serde(default)]
    pub content: String,

    /// Whether this is the final fragment
    #[serde(default)]
    pub done: bool,
}

/// Metadata reported by the backend for an installed model.
///
/// The context-length hint arrives in several shapes depending on the
/// backend version; implementations normalize it up front (see the
/// provider crate's `modelinfo` module).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Maximum context window in tokens, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,

    /// Model family (e.g. "llama"), when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// The text-generation collaborator.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name for this backend (e.g. "ollama").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete answer text.
    async fn chat(
        &self,
        model: &str,
        messages: &[PromptMessage],
        options: ChatOptions,
    ) -> std::result::Result<String, ProviderError>;

    /// Send a prompt and get a stream of content deltas.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[PromptMessage],
        options: ChatOptions,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChatDelta, ProviderError>>,
        ProviderError,
    >;

    /// Embed a single text with the given embedding model.
    async fn embed(
        &self,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<Vec<f32>, ProviderError>;

    /// List installed model names.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError>;

    /// Fetch metadata for an installed model.
    async fn show_model(&self, model: &str) -> std::result::Result<ModelInfo, ProviderError>;
}

/// Anything that can turn text into an embedding vector.
///
/// The vector store uses this seam so that queries and documents are
/// always embedded with the currently active embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_text(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}
