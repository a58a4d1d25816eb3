//! Vector store trait and retrieval value objects.
//!
//! The vector store is an external collaborator that ranks document
//! chunks against a query. Distances are normalized cosine distances in
//! `[0, 2]`; similarity is derived as `1 - distance`.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub file_path: String,
    pub chunk_index: usize,
}

/// One ranked hit returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The chunk text
    pub text: String,

    /// Chunk provenance
    pub metadata: ChunkMetadata,

    /// Normalized cosine distance in `[0, 2]`
    pub distance: f32,
}

impl ScoredDocument {
    /// Similarity derived from the store's distance space.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// A chunk that survived relevance filtering. Transient, produced per
/// query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub file_name: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub similarity: f32,
}

impl RetrievedChunk {
    pub fn from_scored(doc: ScoredDocument) -> Self {
        let similarity = doc.similarity();
        Self {
            text: doc.text,
            file_name: doc.metadata.file_name,
            file_path: doc.metadata.file_path,
            chunk_index: doc.metadata.chunk_index,
            similarity,
        }
    }
}

/// Source attribution for part of an answer. Derived 1:1 from a
/// `RetrievedChunk` that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub file: String,
    pub path: String,
    pub chunk: usize,

    /// Similarity score, when the hit was scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Short excerpt of the cited chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Citation {
    /// Build a citation from a surviving chunk, excerpting its head.
    pub fn from_chunk(chunk: &RetrievedChunk, excerpt_chars: usize) -> Self {
        let excerpt = if excerpt_chars == 0 {
            None
        } else {
            Some(chunk.text.chars().take(excerpt_chars).collect())
        };
        Self {
            file: chunk.file_name.clone(),
            path: chunk.file_path.clone(),
            chunk: chunk.chunk_index,
            score: Some(chunk.similarity),
            excerpt,
        }
    }
}

/// A document as fetched back out of the store (for reindexing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// The vector-store collaborator.
///
/// Implementations embed query and document text themselves via the
/// active embedding model, mirroring an embedding function attached to
/// the collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A human-readable name (e.g. "chroma", "in-memory").
    fn name(&self) -> &str;

    /// Rank stored chunks against the query text. Results arrive in the
    /// store's own ranking order, best first.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, StoreError>;

    /// Add documents with ids and metadata, embedding each in order.
    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[ChunkMetadata],
    ) -> std::result::Result<(), StoreError>;

    /// Delete documents matching a metadata filter (a `where` document).
    async fn delete_where(
        &self,
        filter: &serde_json::Value,
    ) -> std::result::Result<(), StoreError>;

    /// Fetch documents (optionally filtered) with their metadata.
    async fn fetch(
        &self,
        filter: Option<&serde_json::Value>,
    ) -> std::result::Result<Vec<StoredDocument>, StoreError>;

    /// Number of stored documents.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}
