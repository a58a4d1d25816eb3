//! Passage retrieval and relevance filtering.
//!
//! The store returns hits in its own ranking order; hits below the
//! similarity floor are dropped and each survivor yields exactly one
//! citation. An empty survivor set is not an error: the pipeline still
//! asks the model, which the system prompt obliges to say it does not
//! know.

use quarry_core::error::StoreError;
use quarry_core::store::{Citation, RetrievedChunk, VectorStore};
use tracing::debug;

/// The surviving chunks and their citations, in rank order.
#[derive(Debug, Default)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    pub citations: Vec<Citation>,
}

impl Retrieval {
    /// The chunk texts, for context assembly.
    pub fn context_blocks(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }
}

/// Query the store and keep hits at or above `min_similarity`.
pub async fn retrieve(
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
    min_similarity: f32,
    excerpt_chars: usize,
) -> Result<Retrieval, StoreError> {
    let hits = store.query(query, top_k).await?;
    let total = hits.len();

    let chunks: Vec<RetrievedChunk> = hits
        .into_iter()
        .filter(|hit| !hit.text.is_empty() && hit.similarity() >= min_similarity)
        .map(RetrievedChunk::from_scored)
        .collect();

    let citations = chunks
        .iter()
        .map(|chunk| Citation::from_chunk(chunk, excerpt_chars))
        .collect();

    debug!(total, kept = chunks.len(), min_similarity, "Retrieval filtered");
    Ok(Retrieval { chunks, citations })
}
