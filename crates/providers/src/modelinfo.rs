//! Context-window extraction from `/api/show` responses.
//!
//! Ollama reports the context window in different places depending on the
//! model and server version: newer servers put an architecture-prefixed
//! `<arch>.context_length` key under `model_info`, older ones only carry a
//! `num_ctx` line inside the free-form `parameters` text. Rather than
//! probing keys blindly at every call site, the shapes are normalized into
//! one enum here and resolved once.

use serde_json::Value;

/// Context window assumed when the backend reports nothing usable.
pub const DEFAULT_CONTEXT_LENGTH: u32 = 4096;

/// Where (if anywhere) the show response carried a context-window hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextHint {
    /// `model_info["<arch>.context_length"]` on newer servers.
    ModelInfo(u32),
    /// A `num_ctx <n>` line in the `parameters` text on older servers.
    Parameters(u32),
    /// No hint anywhere in the response.
    Missing,
}

impl ContextHint {
    /// Extract the hint from a raw `/api/show` response body.
    pub fn extract(show: &Value) -> Self {
        if let Some(info) = show.get("model_info").and_then(Value::as_object) {
            for (key, value) in info {
                if key.ends_with(".context_length") || key == "context_length" {
                    if let Some(n) = value.as_u64() {
                        return Self::ModelInfo(n as u32);
                    }
                }
            }
        }

        if let Some(params) = show.get("parameters").and_then(Value::as_str) {
            for line in params.lines() {
                let mut parts = line.split_whitespace();
                if parts.next() == Some("num_ctx") {
                    if let Some(n) = parts.next().and_then(|v| v.parse::<u32>().ok()) {
                        return Self::Parameters(n);
                    }
                }
            }
        }

        Self::Missing
    }

    /// The hinted token count, if any.
    pub fn tokens(self) -> Option<u32> {
        match self {
            Self::ModelInfo(n) | Self::Parameters(n) => Some(n),
            Self::Missing => None,
        }
    }

    /// The hinted token count, falling back to [`DEFAULT_CONTEXT_LENGTH`].
    pub fn resolve(self) -> u32 {
        self.tokens().unwrap_or(DEFAULT_CONTEXT_LENGTH)
    }
}

/// Model family from the `details` block, when present.
pub fn family(show: &Value) -> Option<String> {
    show.get("details")
        .and_then(|d| d.get("family"))
        .and_then(Value::as_str)
        .map(String::from)
}
