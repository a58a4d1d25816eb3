//! Persisted model selection state.
//!
//! `ModelState` is the single source of truth for which chat and
//! embedding models are active and how large their context windows are.
//! It is owned by the model registry and survives process restarts.

use serde::{Deserialize, Serialize};

/// Lower bound for any persisted max-token value.
pub const MIN_MODEL_TOKENS: u32 = 512;
/// Upper bound for any persisted max-token value.
pub const MAX_MODEL_TOKENS: u32 = 131_072;

/// Clamp a context-window size into the supported range.
pub fn clamp_model_tokens(tokens: u32) -> u32 {
    tokens.clamp(MIN_MODEL_TOKENS, MAX_MODEL_TOKENS)
}

/// The registry's persisted document.
///
/// Invariant: max-token values are always within
/// `[MIN_MODEL_TOKENS, MAX_MODEL_TOKENS]`; the active embedding model is
/// the one used to embed both the stored documents and future queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub chat_model: String,
    pub chat_model_max_tokens: u32,
    pub embedding_model: String,
    pub embedding_model_max_tokens: u32,
}

impl ModelState {
    /// Normalize token limits into the supported range.
    pub fn clamped(mut self) -> Self {
        self.chat_model_max_tokens = clamp_model_tokens(self.chat_model_max_tokens);
        self.embedding_model_max_tokens = clamp_model_tokens(self.embedding_model_max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_model_tokens(0), MIN_MODEL_TOKENS);
        assert_eq!(clamp_model_tokens(4096), 4096);
        assert_eq!(clamp_model_tokens(10_000_000), MAX_MODEL_TOKENS);
    }

    #[test]
    fn clamped_state_respects_invariant() {
        let state = ModelState {
            chat_model: "llama3.1:8b-instruct-q4_K_M".into(),
            chat_model_max_tokens: 100,
            embedding_model: "mxbai-embed-large".into(),
            embedding_model_max_tokens: 9_999_999,
        }
        .clamped();
        assert_eq!(state.chat_model_max_tokens, MIN_MODEL_TOKENS);
        assert_eq!(state.embedding_model_max_tokens, MAX_MODEL_TOKENS);
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = ModelState {
            chat_model: "llama3.1:8b-instruct-q4_K_M".into(),
            chat_model_max_tokens: 4096,
            embedding_model: "mxbai-embed-large".into(),
            embedding_model_max_tokens: 1024,
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: ModelState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
