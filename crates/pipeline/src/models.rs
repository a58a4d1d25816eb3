//! Model selection operations.
//!
//! Selection is validated against the backend's installed models before
//! anything else happens, so a typo never reaches the registry. A chat
//! model swap just updates the registry; an embedding model swap also
//! rebuilds the vector index, since stored vectors from the old model
//! cannot be compared with queries embedded by the new one.

use quarry_core::error::{Error, ProviderError};
use quarry_core::model::ModelState;
use quarry_core::provider::GenerationBackend;
use quarry_core::store::VectorStore;
use quarry_registry::ModelRegistry;
use quarry_store::StoreCell;
use std::sync::Arc;
use tracing::info;

/// Context window assumed when the backend reports no usable hint.
const FALLBACK_CONTEXT_TOKENS: u32 = 4096;

/// Builds a fresh vector store bound to the currently active embedding
/// model. Invoked during an embedding-model swap.
pub type StoreFactory = Box<dyn Fn() -> Arc<dyn VectorStore> + Send + Sync>;

pub struct ModelService {
    backend: Arc<dyn GenerationBackend>,
    registry: Arc<ModelRegistry>,
    store: Arc<StoreCell>,
    store_factory: StoreFactory,
}

impl ModelService {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        registry: Arc<ModelRegistry>,
        store: Arc<StoreCell>,
        store_factory: StoreFactory,
    ) -> Self {
        Self { backend, registry, store, store_factory }
    }

    /// Names of the models installed on the backend.
    pub async fn installed(&self) -> Result<Vec<String>, Error> {
        Ok(self.backend.list_models().await?)
    }

    /// The current selection.
    pub fn current(&self) -> ModelState {
        self.registry.snapshot()
    }

    async fn ensure_installed(&self, model: &str) -> Result<(), Error> {
        let installed = self.backend.list_models().await?;
        if installed.iter().any(|name| name == model) {
            return Ok(());
        }
        Err(ProviderError::ModelNotFound(model.to_string()).into())
    }

    /// Resolve the model's context window from backend metadata.
    async fn context_tokens(&self, model: &str) -> Result<u32, Error> {
        let info = self.backend.show_model(model).await?;
        Ok(info.context_length.unwrap_or(FALLBACK_CONTEXT_TOKENS))
    }

    /// Switch the chat model. Takes effect on the next query.
    pub async fn select_chat_model(&self, model: &str) -> Result<(), Error> {
        self.ensure_installed(model).await?;
        let tokens = self.context_tokens(model).await?;
        self.registry.set_chat_model(model, Some(tokens))?;
        info!(model, tokens, "Chat model selected");
        Ok(())
    }

    /// Switch the embedding model and rebuild the vector index in the
    /// new embedding space. Returns the number of reindexed documents.
    ///
    /// The rebuild is not atomic: a query arriving mid-swap is served by
    /// whichever store is active at that moment.
    pub async fn select_embedding_model(&self, model: &str) -> Result<usize, Error> {
        self.ensure_installed(model).await?;
        let tokens = self.context_tokens(model).await?;
        self.registry.set_embedding_model(model, Some(tokens))?;

        let target = (self.store_factory)();
        let count = self.store.rebuild_into(target).await?;
        info!(model, reindexed = count, "Embedding model selected");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quarry_core::message::PromptMessage;
    use quarry_core::provider::{ChatDelta, ChatOptions, Embedder, ModelInfo};
    use quarry_core::store::ChunkMetadata;
    use quarry_store::InMemoryStore;

    struct CatalogBackend {
        installed: Vec<String>,
        context_length: Option<u32>,
    }

    #[async_trait]
    impl GenerationBackend for CatalogBackend {
        fn name(&self) -> &str {
            "catalog"
        }

        async fn chat(
            &self,
            _model: &str,
            _messages: &[PromptMessage],
            _options: ChatOptions,
        ) -> Result<String, ProviderError> {
            Ok(String::new())
        }

        async fn chat_stream(
            &self,
            _model: &str,
            _messages: &[PromptMessage],
            _options: ChatOptions,
        ) -> Result<
            tokio::sync::mpsc::Receiver<Result<ChatDelta, ProviderError>>,
            ProviderError,
        > {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn embed(&self, _model: &str, _prompt: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0])
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(self.installed.clone())
        }

        async fn show_model(&self, _model: &str) -> Result<ModelInfo, ProviderError> {
            Ok(ModelInfo { context_length: self.context_length, family: None })
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn service(installed: Vec<&str>, context_length: Option<u32>) -> (ModelService, Arc<ModelRegistry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ModelRegistry::open(
            dir.path().join("runtime_config.json"),
            ModelState {
                chat_model: "llama3.1:8b".into(),
                chat_model_max_tokens: 4096,
                embedding_model: "mxbai-embed-large".into(),
                embedding_model_max_tokens: 1024,
            },
        ));
        let backend = Arc::new(CatalogBackend {
            installed: installed.into_iter().map(String::from).collect(),
            context_length,
        });
        let store = Arc::new(StoreCell::new(Arc::new(InMemoryStore::new(Arc::new(
            FixedEmbedder,
        )))));
        let factory: StoreFactory =
            Box::new(|| Arc::new(InMemoryStore::new(Arc::new(FixedEmbedder))));
        let service = ModelService::new(backend, registry.clone(), store, factory);
        (service, registry, dir)
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_before_registry_changes() {
        let (service, registry, _dir) = service(vec!["llama3.1:8b"], Some(8192));
        let err = service.select_chat_model("typo-model").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::ModelNotFound(_))
        ));
        assert_eq!(registry.chat_model(), "llama3.1:8b");
    }

    #[tokio::test]
    async fn chat_selection_records_the_context_window() {
        let (service, registry, _dir) = service(vec!["llama3.1:8b", "qwen2.5:7b"], Some(32_768));
        service.select_chat_model("qwen2.5:7b").await.unwrap();
        assert_eq!(registry.chat_model(), "qwen2.5:7b");
        assert_eq!(registry.chat_model_max_tokens(), 32_768);
    }

    #[tokio::test]
    async fn missing_context_hint_falls_back() {
        let (service, registry, _dir) = service(vec!["llama3.1:8b", "qwen2.5:7b"], None);
        service.select_chat_model("qwen2.5:7b").await.unwrap();
        assert_eq!(registry.chat_model_max_tokens(), FALLBACK_CONTEXT_TOKENS);
    }

    #[tokio::test]
    async fn embedding_selection_rebuilds_the_index() {
        let (service, registry, _dir) =
            service(vec!["llama3.1:8b", "nomic-embed-text"], Some(2048));

        // Seed the active store with one document.
        let active = service.store.current().await;
        active
            .add(
                &["d-0".into()],
                &["stored chunk".into()],
                &[ChunkMetadata {
                    file_name: "a.pdf".into(),
                    file_path: "/a.pdf".into(),
                    chunk_index: 0,
                }],
            )
            .await
            .unwrap();

        let count = service.select_embedding_model("nomic-embed-text").await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.embedding_model(), "nomic-embed-text");
        assert_eq!(service.store.current().await.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn installed_and_current_report_state() {
        let (service, _registry, _dir) = service(vec!["llama3.1:8b"], Some(4096));
        assert_eq!(service.installed().await.unwrap(), vec!["llama3.1:8b"]);
        assert_eq!(service.current().chat_model, "llama3.1:8b");
    }
}
