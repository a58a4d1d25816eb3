//! Ollama backend over its native HTTP API.
//!
//! Supports:
//! - Chat (non-streaming and streaming NDJSON)
//! - Embeddings
//! - Model listing and metadata

use async_trait::async_trait;
use futures::StreamExt;
use quarry_core::error::ProviderError;
use quarry_core::message::PromptMessage;
use quarry_core::provider::{ChatDelta, ChatOptions, GenerationBackend, ModelInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::modelinfo::{self, ContextHint};

/// An Ollama text-generation backend.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a backend talking to the given base URL
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn to_api_messages(messages: &[PromptMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn chat_request(model: &str, messages: &[PromptMessage], options: &ChatOptions, stream: bool) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: Self::to_api_messages(messages),
            stream,
            options: ApiOptions { temperature: options.temperature },
            keep_alive: options.keep_alive.clone(),
        }
    }

    async fn check_status(
        model: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ModelNotFound(model.to_string()));
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[PromptMessage],
        options: ChatOptions,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::chat_request(model, messages, &options, false);

        debug!(model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(model, response).await?;

        let api_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse chat response: {e}"),
            })?;

        Ok(api_response.message.map(|m| m.content).unwrap_or_default())
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[PromptMessage],
        options: ChatOptions,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChatDelta, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::chat_request(model, messages, &options, true);

        debug!(model, messages = messages.len(), "Sending streaming chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(model, response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Spawn task to read the NDJSON byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                // Append new bytes to our line buffer
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines; each line is one JSON object
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<ChatResponse>(&line) {
                        Ok(chunk) => {
                            let content =
                                chunk.message.map(|m| m.content).unwrap_or_default();
                            let done = chunk.done;

                            if tx.send(Ok(ChatDelta { content, done })).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(line = %line, error = %e, "Ignoring unparseable stream line");
                        }
                    }
                }
            }

            // Stream ended without a done chunk
            let _ = tx
                .send(Ok(ChatDelta { content: String::new(), done: true }))
                .await;
        });

        Ok(rx)
    }

    async fn embed(
        &self,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
        };

        debug!(model, chars = prompt.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(model, response).await?;

        let api_response: EmbeddingsResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        if api_response.embedding.is_empty() {
            return Err(ProviderError::EmbeddingFailed(format!(
                "Model {model} returned an empty embedding"
            )));
        }

        Ok(api_response.embedding)
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    async fn show_model(&self, model: &str) -> std::result::Result<ModelInfo, ProviderError> {
        let url = format!("{}/api/show", self.base_url);
        let body = serde_json::json!({ "model": model });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(model, response).await?;

        let show: serde_json::Value =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse show response: {e}"),
            })?;

        Ok(ModelInfo {
            context_length: ContextHint::extract(&show).tokens(),
            family: modelinfo::family(&show),
        })
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    options: ApiOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f32,
}

/// One `/api/chat` response object; in streaming mode each NDJSON line
/// is one of these.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
