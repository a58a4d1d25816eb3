//! # Quarry Pipeline
//!
//! The retrieval-augmented answer pipeline: retrieve passages, gate
//! recalled history by similarity, fit everything into the active chat
//! model's context window, invoke the model (blocking or streamed), and
//! persist the exchange without holding the caller up.

pub mod answer;
pub mod budget;
pub mod embedder;
pub mod models;
pub mod persist;
pub mod prompt;
pub mod retrieval;

pub use answer::AnswerPipeline;
pub use budget::{HeuristicEstimator, TokenEstimator};
pub use embedder::RegistryEmbedder;
pub use models::ModelService;
