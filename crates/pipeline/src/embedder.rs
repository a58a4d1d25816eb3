//! Embedder bound to the registry's active embedding model.
//!
//! Every call resolves the model name at call time, so a model swap
//! takes effect on the next embedding without reconstructing stores or
//! pipelines.

use async_trait::async_trait;
use quarry_core::error::ProviderError;
use quarry_core::provider::{Embedder, GenerationBackend};
use quarry_registry::ModelRegistry;
use std::sync::Arc;

pub struct RegistryEmbedder {
    backend: Arc<dyn GenerationBackend>,
    registry: Arc<ModelRegistry>,
}

impl RegistryEmbedder {
    pub fn new(backend: Arc<dyn GenerationBackend>, registry: Arc<ModelRegistry>) -> Self {
        Self { backend, registry }
    }
}

#[async_trait]
impl Embedder for RegistryEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let model = self.registry.embedding_model();
        self.backend.embed(&model, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::message::PromptMessage;
    use quarry_core::model::ModelState;
    use quarry_core::provider::{ChatDelta, ChatOptions, ModelInfo};
    use std::sync::Mutex;

    /// Records which model each embed call used.
    struct RecordingBackend {
        used_models: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
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

        async fn embed(&self, model: &str, _prompt: &str) -> Result<Vec<f32>, ProviderError> {
            self.used_models
                .lock()
                .unwrap()
                .push(model.to_string());
            Ok(vec![1.0])
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(Vec::new())
        }

        async fn show_model(&self, _model: &str) -> Result<ModelInfo, ProviderError> {
            Ok(ModelInfo::default())
        }
    }

    #[tokio::test]
    async fn resolves_the_model_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ModelRegistry::open(
            dir.path().join("runtime_config.json"),
            ModelState {
                chat_model: "chat".into(),
                chat_model_max_tokens: 4096,
                embedding_model: "first-model".into(),
                embedding_model_max_tokens: 1024,
            },
        ));
        let backend = Arc::new(RecordingBackend { used_models: Mutex::new(Vec::new()) });
        let embedder = RegistryEmbedder::new(backend.clone(), registry.clone());

        embedder.embed_text("a").await.unwrap();
        registry.set_embedding_model("second-model", None).unwrap();
        embedder.embed_text("b").await.unwrap();

        let used = backend.used_models.lock().unwrap();
        assert_eq!(*used, vec!["first-model".to_string(), "second-model".to_string()]);
    }
}
