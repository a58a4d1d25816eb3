//! Swap coordination for the active vector store.
//!
//! When the embedding model changes, every stored vector becomes
//! incompatible with new queries, so the whole index is rebuilt into a
//! store bound to the new model and then swapped in. The swap is not
//! atomic with respect to the rebuild: queries that arrive during a
//! rebuild keep hitting the old store until the swap lands.

use quarry_core::error::StoreError;
use quarry_core::store::{StoredDocument, VectorStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Holds the currently active vector store and coordinates replacement.
pub struct StoreCell {
    inner: RwLock<Arc<dyn VectorStore>>,
}

impl StoreCell {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { inner: RwLock::new(store) }
    }

    /// The currently active store. The returned handle stays valid across
    /// a concurrent swap; it just keeps pointing at the old store.
    pub async fn current(&self) -> Arc<dyn VectorStore> {
        self.inner.read().await.clone()
    }

    /// Replace the active store, returning the previous one.
    pub async fn swap(&self, store: Arc<dyn VectorStore>) -> Arc<dyn VectorStore> {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, store)
    }

    /// Re-embed every document from the active store into `target`, then
    /// make `target` the active store. Returns the number of documents
    /// reindexed.
    ///
    /// `target` embeds with the new model, so the copied documents come
    /// out in the new embedding space.
    pub async fn rebuild_into(
        &self,
        target: Arc<dyn VectorStore>,
    ) -> Result<usize, StoreError> {
        let source = self.current().await;
        let documents = source.fetch(None).await?;
        let count = documents.len();

        if count > 0 {
            let (ids, texts, metadatas) = split_documents(documents);
            target.add(&ids, &texts, &metadatas).await?;
        }

        self.swap(target).await;
        info!(count, "Vector index rebuilt");
        Ok(count)
    }
}

fn split_documents(
    documents: Vec<StoredDocument>,
) -> (Vec<String>, Vec<String>, Vec<quarry_core::store::ChunkMetadata>) {
    let mut ids = Vec::with_capacity(documents.len());
    let mut texts = Vec::with_capacity(documents.len());
    let mut metadatas = Vec::with_capacity(documents.len());
    for doc in documents {
        ids.push(doc.id);
        texts.push(doc.text);
        metadatas.push(doc.metadata);
    }
    (ids, texts, metadatas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;
    use quarry_core::error::ProviderError;
    use quarry_core::provider::Embedder;
    use quarry_core::store::ChunkMetadata;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn meta(index: usize) -> ChunkMetadata {
        ChunkMetadata {
            file_name: "doc.pdf".into(),
            file_path: "/storage/doc.pdf".into(),
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn current_returns_the_held_store() {
        let store = Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(vec![1.0]))));
        let cell = StoreCell::new(store);
        assert_eq!(cell.current().await.name(), "in-memory");
    }

    #[tokio::test]
    async fn rebuild_copies_documents_and_swaps() {
        let old = Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(vec![1.0, 0.0]))));
        old.add(
            &["d-0".into(), "d-1".into()],
            &["first".into(), "second".into()],
            &[meta(0), meta(1)],
        )
        .await
        .unwrap();

        let cell = StoreCell::new(old);
        let new = Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(vec![0.0, 1.0]))));

        let count = cell.rebuild_into(new).await.unwrap();
        assert_eq!(count, 2);

        let active = cell.current().await;
        assert_eq!(active.count().await.unwrap(), 2);
        let docs = active.fetch(None).await.unwrap();
        assert!(docs.iter().any(|d| d.text == "first"));
    }

    #[tokio::test]
    async fn rebuild_of_empty_store_swaps_without_adding() {
        let cell = StoreCell::new(Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(
            vec![1.0],
        )))));
        let new = Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(vec![1.0]))));
        let count = cell.rebuild_into(new).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(cell.current().await.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handle_survives_swap() {
        let cell = StoreCell::new(Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(
            vec![1.0],
        )))));
        let held = cell.current().await;
        cell.swap(Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder(vec![1.0])))))
            .await;
        // The old handle still answers.
        assert_eq!(held.count().await.unwrap(), 0);
    }
}
