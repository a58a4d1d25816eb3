//! Chroma vector store over its REST API.
//!
//! The collection is resolved lazily on first use with `get_or_create`,
//! so a fresh server works without manual setup. Query and document text
//! is embedded here, via the active embedding model, before it reaches
//! the server; Chroma only ever sees vectors.

use async_trait::async_trait;
use quarry_core::error::StoreError;
use quarry_core::provider::Embedder;
use quarry_core::store::{ChunkMetadata, ScoredDocument, StoredDocument, VectorStore};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A Chroma-backed vector store.
pub struct ChromaStore {
    base_url: String,
    collection: String,
    collection_id: tokio::sync::OnceCell<String>,
    embedder: Arc<dyn Embedder>,
    client: reqwest::Client,
}

impl ChromaStore {
    /// Create a store for `collection` on the server at `base_url`
    /// (e.g. `http://localhost:8000`).
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            collection_id: tokio::sync::OnceCell::new(),
            embedder,
            client,
        }
    }

    /// Resolve (and cache) the collection id, creating the collection if
    /// it does not exist yet.
    async fn collection_id(&self) -> Result<&str, StoreError> {
        self.collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections", self.base_url);
                let body = serde_json::json!({
                    "name": self.collection,
                    "get_or_create": true,
                    "metadata": { "hnsw:space": "cosine" },
                });

                let response = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| StoreError::Network(e.to_string()))?;

                let status = response.status().as_u16();
                if status != 200 {
                    let text = response.text().await.unwrap_or_default();
                    return Err(StoreError::ApiError { status_code: status, message: text });
                }

                let created: CollectionResponse = response
                    .json()
                    .await
                    .map_err(|e| StoreError::ApiError {
                        status_code: 200,
                        message: format!("Failed to parse collection response: {e}"),
                    })?;

                debug!(collection = %self.collection, id = %created.id, "Resolved collection");
                Ok(created.id)
            })
            .await
            .map(String::as_str)
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, StoreError> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/{}", self.base_url, id, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(StoreError::CollectionNotFound(self.collection.clone()));
        }
        if status != 200 && status != 201 {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError { status_code: status, message: text });
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, StoreError> {
        let embedding = self
            .embedder
            .embed_text(text)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("query embedding: {e}")))?;

        let body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });

        let response = self.post("query", &body).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("parse query response: {e}")))?;

        Ok(parsed.into_scored())
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
        if ids.is_empty() {
            return Ok(());
        }

        let mut embeddings = Vec::with_capacity(documents.len());
        for doc in documents {
            let embedding = self
                .embedder
                .embed_text(doc)
                .await
                .map_err(|e| StoreError::IndexFailed(format!("document embedding: {e}")))?;
            embeddings.push(embedding);
        }

        let body = serde_json::json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });

        self.post("add", &body).await?;
        debug!(count = ids.len(), collection = %self.collection, "Indexed documents");
        Ok(())
    }

    async fn delete_where(
        &self,
        filter: &serde_json::Value,
    ) -> std::result::Result<(), StoreError> {
        let body = serde_json::json!({ "where": filter });
        self.post("delete", &body).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        filter: Option<&serde_json::Value>,
    ) -> std::result::Result<Vec<StoredDocument>, StoreError> {
        let mut body = serde_json::json!({
            "include": ["documents", "metadatas"],
        });
        if let Some(filter) = filter {
            body["where"] = filter.clone();
        }

        let response = self.post("get", &body).await?;
        let parsed: GetResponse = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("parse get response: {e}")))?;

        Ok(parsed.into_documents())
    }

    async fn count(&self) -> std::result::Result<usize, StoreError> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/count", self.base_url, id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError { status_code: status, message: text });
        }

        response
            .json::<usize>()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("parse count response: {e}")))
    }
}

// --- Chroma API types (internal) ---

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

/// Query results arrive as per-query nested arrays; only one query
/// embedding is ever sent, so only the first row matters.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<serde_json::Value>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

impl QueryResponse {
    fn into_scored(self) -> Vec<ScoredDocument> {
        let documents = first_row(self.documents);
        let metadatas = first_row(self.metadatas);
        let distances = first_row(self.distances);

        documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .filter_map(|((text, metadata), distance)| {
                match serde_json::from_value::<ChunkMetadata>(metadata) {
                    Ok(metadata) => Some(ScoredDocument { text, metadata, distance }),
                    Err(e) => {
                        warn!(error = %e, "Skipping hit with malformed metadata");
                        None
                    }
                }
            })
            .collect()
    }
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<String>>,
    #[serde(default)]
    metadatas: Option<Vec<serde_json::Value>>,
}

impl GetResponse {
    fn into_documents(self) -> Vec<StoredDocument> {
        let documents = self.documents.unwrap_or_default();
        let metadatas = self.metadatas.unwrap_or_default();

        self.ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .filter_map(|((id, text), metadata)| {
                match serde_json::from_value::<ChunkMetadata>(metadata) {
                    Ok(metadata) => Some(StoredDocument { id, text, metadata }),
                    Err(e) => {
                        warn!(error = %e, "Skipping document with malformed metadata");
                        None
                    }
                }
            })
            .collect()
    }
}
