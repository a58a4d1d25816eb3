//! Persistent registry for the current chat/embedding model selection.
//!
//! Backed by a small JSON document that is rewritten atomically on every
//! mutation, so the selection survives process restarts. All reads and
//! writes are serialized by a single mutex; reads are cheap, so a plain
//! mutex is preferred over a reader/writer lock.
//!
//! Changing the embedding model is a higher-consequence operation than
//! changing the chat model: it invalidates the vector index's query
//! compatibility. The registry only records the selection; the index
//! rebuild is orchestrated by the caller.

use quarry_core::error::RegistryError;
use quarry_core::model::{clamp_model_tokens, ModelState};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// The model registry. Cheap to share behind an `Arc`.
pub struct ModelRegistry {
    path: PathBuf,
    state: Mutex<ModelState>,
}

impl ModelRegistry {
    /// Open (or initialize) the registry at `path`.
    ///
    /// A missing or corrupt persisted file falls back to `defaults`
    /// rather than failing startup; the file is rewritten immediately so
    /// the on-disk document is always well-formed afterwards.
    pub fn open(path: impl Into<PathBuf>, defaults: ModelState) -> Self {
        let path = path.into();
        let state = Self::load_or_init(&path, defaults);
        let registry = Self { path, state: Mutex::new(state) };
        if let Err(e) = registry.persist_current() {
            warn!(error = %e, "Failed to write initial registry document");
        }
        registry
    }

    fn load_or_init(path: &Path, defaults: ModelState) -> ModelState {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ModelState>(&content) {
                Ok(state) => {
                    debug!(path = %path.display(), "Loaded registry state");
                    state.clamped()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt registry document, using defaults");
                    defaults.clamped()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "No registry document, using defaults");
                defaults.clamped()
            }
        }
    }

    /// Atomically rewrite the persisted document from the current state.
    fn persist_current(&self) -> Result<(), RegistryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner()).clone();
        self.persist(&state)
    }

    fn persist(&self, state: &ModelState) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RegistryError::PersistFailed(format!("create {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| RegistryError::PersistFailed(format!("serialize: {e}")))?;

        // Write-then-rename keeps the document whole under crashes.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| RegistryError::PersistFailed(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| RegistryError::PersistFailed(format!("rename {}: {e}", self.path.display())))?;

        Ok(())
    }

    /// The currently selected chat model.
    pub fn chat_model(&self) -> String {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).chat_model.clone()
    }

    /// The currently selected embedding model.
    pub fn embedding_model(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .embedding_model
            .clone()
    }

    /// Context window of the current chat model, in tokens.
    pub fn chat_model_max_tokens(&self) -> u32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).chat_model_max_tokens
    }

    /// Context window of the current embedding model, in tokens.
    pub fn embedding_model_max_tokens(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .embedding_model_max_tokens
    }

    /// Snapshot of the whole state.
    pub fn snapshot(&self) -> ModelState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Select a new chat model. `max_tokens`, when given, replaces the
    /// stored window (clamped); otherwise the stored value is kept.
    pub fn set_chat_model(
        &self,
        name: impl Into<String>,
        max_tokens: Option<u32>,
    ) -> Result<(), RegistryError> {
        let state = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            guard.chat_model = name.into();
            if let Some(tokens) = max_tokens {
                guard.chat_model_max_tokens = clamp_model_tokens(tokens);
            }
            guard.clone()
        };
        self.persist(&state)?;
        debug!(model = %state.chat_model, max_tokens = state.chat_model_max_tokens, "Chat model updated");
        Ok(())
    }

    /// Select a new embedding model. The caller must rebuild the vector
    /// index afterwards; old vectors live in a different embedding space.
    pub fn set_embedding_model(
        &self,
        name: impl Into<String>,
        max_tokens: Option<u32>,
    ) -> Result<(), RegistryError> {
        let state = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            guard.embedding_model = name.into();
            if let Some(tokens) = max_tokens {
                guard.embedding_model_max_tokens = clamp_model_tokens(tokens);
            }
            guard.clone()
        };
        self.persist(&state)?;
        debug!(model = %state.embedding_model, "Embedding model updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::model::{MAX_MODEL_TOKENS, MIN_MODEL_TOKENS};

    fn defaults() -> ModelState {
        ModelState {
            chat_model: "llama3.1:8b-instruct-q4_K_M".into(),
            chat_model_max_tokens: 4096,
            embedding_model: "mxbai-embed-large".into(),
            embedding_model_max_tokens: 1024,
        }
    }

    fn registry_in(dir: &tempfile::TempDir) -> ModelRegistry {
        ModelRegistry::open(dir.path().join("runtime_config.json"), defaults())
    }

    #[test]
    fn fresh_registry_uses_defaults_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        assert_eq!(registry.chat_model(), "llama3.1:8b-instruct-q4_K_M");
        assert!(dir.path().join("runtime_config.json").exists());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = registry_in(&dir);
            registry.set_chat_model("qwen2.5:7b", Some(32_768)).unwrap();
        }
        let reopened = registry_in(&dir);
        assert_eq!(reopened.chat_model(), "qwen2.5:7b");
        assert_eq!(reopened.chat_model_max_tokens(), 32_768);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime_config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let registry = ModelRegistry::open(&path, defaults());
        assert_eq!(registry.embedding_model(), "mxbai-embed-large");

        // The corrupt file was replaced by a well-formed one.
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<ModelState>(&content).is_ok());
    }

    #[test]
    fn max_tokens_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        registry.set_chat_model("tiny", Some(1)).unwrap();
        assert_eq!(registry.chat_model_max_tokens(), MIN_MODEL_TOKENS);
        registry.set_embedding_model("huge", Some(u32::MAX)).unwrap();
        assert_eq!(registry.embedding_model_max_tokens(), MAX_MODEL_TOKENS);
    }

    #[test]
    fn omitted_max_tokens_keeps_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        registry.set_chat_model("qwen2.5:7b", None).unwrap();
        assert_eq!(registry.chat_model_max_tokens(), 4096);
    }

    #[test]
    fn persisted_out_of_range_values_are_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime_config.json");
        let mut state = defaults();
        state.chat_model_max_tokens = 7;
        std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let registry = ModelRegistry::open(&path, defaults());
        assert_eq!(registry.chat_model_max_tokens(), MIN_MODEL_TOKENS);
    }

    #[test]
    fn snapshot_reflects_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        registry.set_embedding_model("nomic-embed-text", Some(2048)).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap.embedding_model, "nomic-embed-text");
        assert_eq!(snap.embedding_model_max_tokens, 2048);
    }
}
