//! # Quarry Providers
//!
//! Generation backend implementations. Currently one backend: Ollama,
//! spoken over its native HTTP API (`/api/chat`, `/api/embeddings`,
//! `/api/tags`, `/api/show`).

pub mod modelinfo;
pub mod ollama;

pub use ollama::OllamaProvider;
