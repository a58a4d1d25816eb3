//! Configuration loading and validation for Quarry.
//!
//! Loads configuration from `~/.quarry/config.toml` with environment
//! variable overrides (`QUARRY_*`). Validates all settings at startup.

use quarry_core::model::{MAX_MODEL_TOKENS, MIN_MODEL_TOKENS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.quarry/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Ollama backend
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Base URL of the Chroma vector store
    #[serde(default = "default_chroma_url")]
    pub chroma_url: String,

    /// Directory holding the persisted registry document
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// SQLite connection string for the turn log
    #[serde(default = "default_history_db")]
    pub history_db: String,

    /// Model defaults (used when no registry document exists yet)
    #[serde(default)]
    pub models: ModelsConfig,

    /// Retrieval and answer-pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_chroma_url() -> String {
    "http://localhost:8000".into()
}
fn default_config_dir() -> PathBuf {
    dirs_home().join(".quarry")
}
fn default_history_db() -> String {
    "sqlite://chat_history.db".into()
}

/// Compiled-in model defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_chat_max_tokens")]
    pub chat_model_max_tokens: u32,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_max_tokens")]
    pub embedding_model_max_tokens: u32,
}

fn default_chat_model() -> String {
    "llama3.1:8b-instruct-q4_K_M".into()
}
fn default_chat_max_tokens() -> u32 {
    4096
}
fn default_embedding_model() -> String {
    "mxbai-embed-large".into()
}
fn default_embedding_max_tokens() -> u32 {
    1024
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            chat_model_max_tokens: default_chat_max_tokens(),
            embedding_model: default_embedding_model(),
            embedding_model_max_tokens: default_embedding_max_tokens(),
        }
    }
}

/// Tuning knobs for retrieval, memory gating, and streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many candidates to request from the vector store
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many user/assistant pairs to recall from the turn log
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Minimum similarity for a retrieved chunk to survive filtering
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Minimum similarity for a history pair to be injected
    #[serde(default = "default_history_similarity")]
    pub history_similarity: f32,

    /// Maximum history pairs injected into the prompt
    #[serde(default = "default_max_history_pairs")]
    pub max_history_pairs: usize,

    /// Tokens reserved for the model's own output
    #[serde(default = "default_answer_reserve_tokens")]
    pub answer_reserve_tokens: u32,

    /// Size of streamed answer frames, in characters
    #[serde(default = "default_stream_frame_chars")]
    pub stream_frame_chars: usize,

    /// Sampling temperature for grounded QA
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Keep-alive hint passed to the backend (e.g. "5m")
    #[serde(default = "default_keep_alive", skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,

    /// Excerpt length for citations, in characters (0 = no excerpt)
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Default language tag for prompt localization
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

fn default_top_k() -> usize {
    5
}
fn default_history_turns() -> usize {
    4
}
fn default_min_similarity() -> f32 {
    0.75
}
fn default_history_similarity() -> f32 {
    0.85
}
fn default_max_history_pairs() -> usize {
    4
}
fn default_answer_reserve_tokens() -> u32 {
    500
}
fn default_stream_frame_chars() -> usize {
    10
}
fn default_temperature() -> f32 {
    0.2
}
fn default_keep_alive() -> Option<String> {
    Some("5m".into())
}
fn default_excerpt_chars() -> usize {
    160
}
fn default_lang() -> String {
    "uk".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_turns: default_history_turns(),
            min_similarity: default_min_similarity(),
            history_similarity: default_history_similarity(),
            max_history_pairs: default_max_history_pairs(),
            answer_reserve_tokens: default_answer_reserve_tokens(),
            stream_frame_chars: default_stream_frame_chars(),
            temperature: default_temperature(),
            keep_alive: default_keep_alive(),
            excerpt_chars: default_excerpt_chars(),
            default_lang: default_lang(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.quarry/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `QUARRY_OLLAMA_URL`
    /// - `QUARRY_CHROMA_URL`
    /// - `QUARRY_HISTORY_DB`
    /// - `QUARRY_CHAT_MODEL`
    /// - `QUARRY_EMBEDDING_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = default_config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(url) = std::env::var("QUARRY_OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(url) = std::env::var("QUARRY_CHROMA_URL") {
            config.chroma_url = url;
        }
        if let Ok(db) = std::env::var("QUARRY_HISTORY_DB") {
            config.history_db = db;
        }
        if let Ok(model) = std::env::var("QUARRY_CHAT_MODEL") {
            config.models.chat_model = model;
        }
        if let Ok(model) = std::env::var("QUARRY_EMBEDDING_MODEL") {
            config.models.embedding_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Path of the persisted registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.config_dir.join("runtime_config.json")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.pipeline.min_similarity) {
            return Err(ConfigError::ValidationError(
                "pipeline.min_similarity must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.pipeline.history_similarity) {
            return Err(ConfigError::ValidationError(
                "pipeline.history_similarity must be between 0.0 and 1.0".into(),
            ));
        }

        if self.pipeline.stream_frame_chars == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.stream_frame_chars must be at least 1".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.pipeline.temperature) {
            return Err(ConfigError::ValidationError(
                "pipeline.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, tokens) in [
            ("models.chat_model_max_tokens", self.models.chat_model_max_tokens),
            (
                "models.embedding_model_max_tokens",
                self.models.embedding_model_max_tokens,
            ),
        ] {
            if !(MIN_MODEL_TOKENS..=MAX_MODEL_TOKENS).contains(&tokens) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between {MIN_MODEL_TOKENS} and {MAX_MODEL_TOKENS}"
                )));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            chroma_url: default_chroma_url(),
            config_dir: default_config_dir(),
            history_db: default_history_db(),
            models: ModelsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.top_k, 5);
        assert_eq!(config.pipeline.answer_reserve_tokens, 500);
        assert_eq!(config.models.chat_model_max_tokens, 4096);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.ollama_url, config.ollama_url);
        assert_eq!(parsed.pipeline.stream_frame_chars, 10);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.models.embedding_model, "mxbai-embed-large");
    }

    #[test]
    fn invalid_similarity_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.min_similarity = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_frame_size_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.stream_frame_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_token_limit_rejected() {
        let mut config = AppConfig::default();
        config.models.chat_model_max_tokens = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ollama_url = \"http://ollama:11434\"").unwrap();
        writeln!(file, "[pipeline]").unwrap();
        writeln!(file, "top_k = 8").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.ollama_url, "http://ollama:11434");
        assert_eq!(config.pipeline.top_k, 8);
        assert_eq!(config.pipeline.history_turns, 4);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [[[").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn registry_path_is_under_config_dir() {
        let config = AppConfig::default();
        assert!(config.registry_path().ends_with("runtime_config.json"));
    }
}
