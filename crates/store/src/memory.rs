//! In-process vector store with cosine ranking.
//!
//! Used for tests and single-machine development. Embeddings come from
//! the same `Embedder` seam as the Chroma store, so gating thresholds
//! behave identically across backends. Distances are reported as
//! `1 - cosine_similarity` to match Chroma's cosine space.

use async_trait::async_trait;
use quarry_core::error::StoreError;
use quarry_core::provider::Embedder;
use quarry_core::store::{ChunkMetadata, ScoredDocument, StoredDocument, VectorStore};
use quarry_core::vector::cosine_similarity;
use std::sync::{Arc, Mutex};

struct Entry {
    id: String,
    text: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// An in-memory vector store.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, entries: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Match an entry's metadata against a Chroma-style `where` document:
/// either a map of equality constraints or `{"$and": [...]}`.
fn matches_filter(metadata: &ChunkMetadata, filter: &serde_json::Value) -> bool {
    let Some(object) = filter.as_object() else {
        return false;
    };

    // Serialization of a plain struct to a JSON object cannot fail.
    let meta = serde_json::to_value(metadata).unwrap_or_default();

    object.iter().all(|(key, expected)| match key.as_str() {
        "$and" => expected
            .as_array()
            .is_some_and(|clauses| clauses.iter().all(|c| matches_filter(metadata, c))),
        field => meta.get(field) == Some(expected),
    })
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, StoreError> {
        let query_embedding = self
            .embedder
            .embed_text(text)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("query embedding: {e}")))?;

        let mut scored: Vec<ScoredDocument> = {
            let entries = self.lock();
            entries
                .iter()
                .map(|entry| ScoredDocument {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    distance: 1.0 - cosine_similarity(&entry.embedding, &query_embedding),
                })
                .collect()
        };

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[ChunkMetadata],
    ) -> std::result::Result<(), StoreError> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(StoreError::IndexFailed(format!(
                "Mismatched batch lengths: {} ids, {} documents, {} metadatas",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }

        let mut new_entries = Vec::with_capacity(ids.len());
        for ((id, text), metadata) in ids.iter().zip(documents).zip(metadatas) {
            let embedding = self
                .embedder
                .embed_text(text)
                .await
                .map_err(|e| StoreError::IndexFailed(format!("document embedding: {e}")))?;
            new_entries.push(Entry {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
                embedding,
            });
        }

        let mut entries = self.lock();
        // Re-adding an id replaces the previous document.
        entries.retain(|e| !ids.contains(&e.id));
        entries.extend(new_entries);
        Ok(())
    }

    async fn delete_where(
        &self,
        filter: &serde_json::Value,
    ) -> std::result::Result<(), StoreError> {
        let mut entries = self.lock();
        entries.retain(|e| !matches_filter(&e.metadata, filter));
        Ok(())
    }

    async fn fetch(
        &self,
        filter: Option<&serde_json::Value>,
    ) -> std::result::Result<Vec<StoredDocument>, StoreError> {
        let entries = self.lock();
        Ok(entries
            .iter()
            .filter(|e| filter.is_none_or(|f| matches_filter(&e.metadata, f)))
            .map(|e| StoredDocument {
                id: e.id.clone(),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> std::result::Result<usize, StoreError> {
        Ok(self.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::error::ProviderError;

    /// Maps known texts to fixed unit vectors so ranking is deterministic.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(match text {
                t if t.contains("termination") => vec![1.0, 0.0, 0.0],
                t if t.contains("salary") => vec![0.0, 1.0, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }
    }

    fn meta(file: &str, index: usize) -> ChunkMetadata {
        ChunkMetadata {
            file_name: file.into(),
            file_path: format!("/storage/{file}"),
            chunk_index: index,
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new(Arc::new(StubEmbedder));
        store
            .add(
                &["a-0".into(), "a-1".into(), "b-0".into()],
                &[
                    "termination notice period".into(),
                    "salary review schedule".into(),
                    "office floor plan".into(),
                ],
                &[meta("a.pdf", 0), meta("a.pdf", 1), meta("b.pdf", 0)],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_distance() {
        let store = seeded_store().await;
        let hits = store.query("termination clause", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "termination notice period");
        assert!(hits[0].distance < 1e-6);
        assert!(hits[1].distance > hits[0].distance);
    }

    #[tokio::test]
    async fn query_respects_top_k() {
        let store = seeded_store().await;
        let hits = store.query("termination clause", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn re_adding_an_id_replaces_the_document() {
        let store = seeded_store().await;
        store
            .add(
                &["a-0".into()],
                &["termination updated".into()],
                &[meta("a.pdf", 0)],
            )
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
        let docs = store.fetch(None).await.unwrap();
        let doc = docs.iter().find(|d| d.id == "a-0").unwrap();
        assert_eq!(doc.text, "termination updated");
    }

    #[tokio::test]
    async fn mismatched_batch_lengths_fail() {
        let store = InMemoryStore::new(Arc::new(StubEmbedder));
        let result = store.add(&["x".into()], &[], &[]).await;
        assert!(matches!(result, Err(StoreError::IndexFailed(_))));
    }

    #[tokio::test]
    async fn delete_where_removes_matching_documents() {
        let store = seeded_store().await;
        store
            .delete_where(&serde_json::json!({"file_name": "a.pdf"}))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let docs = store.fetch(None).await.unwrap();
        assert_eq!(docs[0].metadata.file_name, "b.pdf");
    }

    #[tokio::test]
    async fn and_filter_requires_all_clauses() {
        let store = seeded_store().await;
        let filter = serde_json::json!({
            "$and": [{"file_name": "a.pdf"}, {"chunk_index": 1}]
        });
        let docs = store.fetch(Some(&filter)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a-1");
    }

    #[tokio::test]
    async fn fetch_without_filter_returns_everything() {
        let store = seeded_store().await;
        assert_eq!(store.fetch(None).await.unwrap().len(), 3);
    }
}
