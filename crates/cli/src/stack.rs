//! Collaborator wiring from configuration.
//!
//! One place that turns an `AppConfig` into the live object graph:
//! Ollama backend, model registry, registry-bound embedder, Chroma
//! store behind a swap cell, SQLite turn log, and the pipeline itself.

use quarry_config::AppConfig;
use quarry_core::model::ModelState;
use quarry_core::provider::GenerationBackend;
use quarry_core::store::VectorStore;
use quarry_history::SqliteTurnStore;
use quarry_pipeline::models::StoreFactory;
use quarry_pipeline::{AnswerPipeline, ModelService, RegistryEmbedder};
use quarry_providers::OllamaProvider;
use quarry_registry::ModelRegistry;
use quarry_store::{ChromaStore, StoreCell};
use std::sync::Arc;

/// The wired application stack.
pub struct Stack {
    pub config: AppConfig,
    pub backend: Arc<dyn GenerationBackend>,
    pub registry: Arc<ModelRegistry>,
    pub store: Arc<StoreCell>,
    pub pipeline: AnswerPipeline,
    pub models: ModelService,
}

/// Each embedding model gets its own collection; vectors from different
/// models never share an index.
fn collection_name(embedding_model: &str) -> String {
    let suffix: String = embedding_model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("documents_{suffix}")
}

pub async fn build() -> Result<Stack, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    let backend: Arc<dyn GenerationBackend> =
        Arc::new(OllamaProvider::new(&config.ollama_url));

    let registry = Arc::new(ModelRegistry::open(
        config.registry_path(),
        ModelState {
            chat_model: config.models.chat_model.clone(),
            chat_model_max_tokens: config.models.chat_model_max_tokens,
            embedding_model: config.models.embedding_model.clone(),
            embedding_model_max_tokens: config.models.embedding_model_max_tokens,
        },
    ));

    let embedder = Arc::new(RegistryEmbedder::new(backend.clone(), registry.clone()));

    let store = Arc::new(StoreCell::new(Arc::new(ChromaStore::new(
        &config.chroma_url,
        collection_name(&registry.embedding_model()),
        embedder.clone(),
    ))));

    let history = Arc::new(SqliteTurnStore::new(&config.history_db).await?);

    let pipeline = AnswerPipeline::new(
        backend.clone(),
        registry.clone(),
        store.clone(),
        history,
        config.pipeline.clone(),
    );

    let factory: StoreFactory = {
        let chroma_url = config.chroma_url.clone();
        let registry = registry.clone();
        let embedder = embedder.clone();
        Box::new(move || {
            Arc::new(ChromaStore::new(
                &chroma_url,
                collection_name(&registry.embedding_model()),
                embedder.clone(),
            )) as Arc<dyn VectorStore>
        })
    };
    let models = ModelService::new(backend.clone(), registry.clone(), store.clone(), factory);

    Ok(Stack { config, backend, registry, store, pipeline, models })
}
