//! Error types for the Quarry domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Quarry operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Vector store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Turn log errors ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Model registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not installed: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Vector store request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Indexing failed: {0}")]
    IndexFailed(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to persist registry state: {0}")]
    PersistFailed(String),
}
