//! # Quarry Core
//!
//! Domain types, traits, and error definitions for the Quarry document QA
//! engine. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod answer;
pub mod error;
pub mod message;
pub mod model;
pub mod provider;
pub mod store;
pub mod turn;
pub mod vector;

// Re-export key types at crate root for ergonomics
pub use answer::{Answer, AnswerEvent};
pub use error::{Error, Result};
pub use message::{PromptMessage, Role};
pub use model::ModelState;
pub use provider::{ChatDelta, ChatOptions, Embedder, GenerationBackend, ModelInfo};
pub use store::{Citation, ChunkMetadata, RetrievedChunk, ScoredDocument, VectorStore};
pub use turn::{Turn, TurnStore};
