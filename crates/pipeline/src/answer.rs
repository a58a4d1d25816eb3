//! The answer pipeline.
//!
//! Both entry points share one preparation step: embed the query, rank
//! and filter passages, gate recalled history by similarity, fit the
//! survivors into the active chat model's window, and assemble the
//! prompt. `answer` then blocks on one model call; `stream_answer`
//! consumes the model incrementally, re-chunks its output into
//! fixed-size frames, and closes with exactly one `Final` event. In
//! both cases the exchange is persisted on a detached task once the
//! answer text is fully known.

use crate::budget::{self, HeuristicEstimator, TokenEstimator};
use crate::persist::spawn_persist;
use crate::prompt;
use crate::retrieval;
use quarry_config::PipelineConfig;
use quarry_core::answer::{Answer, AnswerEvent};
use quarry_core::error::{Error, Result};
use quarry_core::message::PromptMessage;
use quarry_core::provider::{ChatOptions, GenerationBackend};
use quarry_core::store::Citation;
use quarry_core::turn::TurnStore;
use quarry_history::filter_relevant_pairs;
use quarry_registry::ModelRegistry;
use quarry_store::StoreCell;
use std::sync::Arc;
use tracing::{debug, info};

pub struct AnswerPipeline {
    backend: Arc<dyn GenerationBackend>,
    registry: Arc<ModelRegistry>,
    store: Arc<StoreCell>,
    history: Arc<dyn TurnStore>,
    estimator: Arc<dyn TokenEstimator>,
    config: PipelineConfig,
}

/// Everything both entry points need after preparation.
struct Prepared {
    chat_model: String,
    embedding_model: String,
    query_embedding: Vec<f32>,
    messages: Vec<PromptMessage>,
    citations: Vec<Citation>,
}

impl AnswerPipeline {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        registry: Arc<ModelRegistry>,
        store: Arc<StoreCell>,
        history: Arc<dyn TurnStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            store,
            history,
            estimator: Arc::new(HeuristicEstimator),
            config,
        }
    }

    /// Replace the token estimator (the default is the chars/4 heuristic).
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.config.temperature,
            keep_alive: self.config.keep_alive.clone(),
        }
    }

    async fn prepare(
        &self,
        user_id: &str,
        query: &str,
        top_k: Option<usize>,
        lang: Option<&str>,
    ) -> Result<Prepared> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let lang = lang.unwrap_or(&self.config.default_lang);

        // The query embedding serves both the history gate and, later,
        // the persisted user turn.
        let embedding_model = self.registry.embedding_model();
        let query_embedding = self.backend.embed(&embedding_model, query).await?;

        let store = self.store.current().await;
        let retrieval = retrieval::retrieve(
            store.as_ref(),
            query,
            top_k,
            self.config.min_similarity,
            self.config.excerpt_chars,
        )
        .await?;

        let recalled = self.history.recall(user_id, self.config.history_turns).await?;
        let gated = filter_relevant_pairs(
            &recalled,
            &query_embedding,
            &embedding_model,
            self.config.history_similarity,
            self.config.max_history_pairs,
        );

        // Window limits are read from the registry per request, so a
        // model swap takes effect on the next query without restart.
        let max_tokens = self.registry.chat_model_max_tokens();
        let window = max_tokens
            .saturating_sub(self.estimator.estimate(prompt::system_prompt(lang)))
            .saturating_sub(self.estimator.estimate(&prompt::user_prompt_scaffold(query, lang)))
            .saturating_sub(self.config.answer_reserve_tokens);

        let plan = budget::plan(
            self.estimator.as_ref(),
            window,
            &gated,
            &retrieval.context_blocks(),
        );
        debug!(
            window,
            history_tokens = plan.history_tokens,
            block_tokens = plan.block_tokens,
            blocks = plan.blocks.len(),
            "Context window allocated"
        );

        let messages = prompt::assemble(query, &plan.blocks, &plan.history, lang);

        Ok(Prepared {
            chat_model: self.registry.chat_model(),
            embedding_model,
            query_embedding,
            messages,
            citations: retrieval.citations,
        })
    }

    /// Answer in one blocking model call.
    pub async fn answer(
        &self,
        user_id: &str,
        query: &str,
        top_k: Option<usize>,
        lang: Option<&str>,
    ) -> Result<Answer> {
        let prepared = self.prepare(user_id, query, top_k, lang).await?;

        let start = std::time::Instant::now();
        let text = self
            .backend
            .chat(&prepared.chat_model, &prepared.messages, self.chat_options())
            .await?;
        info!(
            user_id,
            model = %prepared.chat_model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Answer generated"
        );

        spawn_persist(
            self.history.clone(),
            user_id.to_string(),
            query.to_string(),
            text.clone(),
            prepared.embedding_model,
            prepared.query_embedding,
        );

        Ok(Answer { text, citations: prepared.citations })
    }

    /// Answer as a stream of fixed-size `Partial` frames followed by one
    /// `Final` event carrying the full text and citations.
    pub async fn stream_answer(
        &self,
        user_id: &str,
        query: &str,
        top_k: Option<usize>,
        lang: Option<&str>,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<AnswerEvent>>> {
        let prepared = self.prepare(user_id, query, top_k, lang).await?;

        let mut deltas = self
            .backend
            .chat_stream(&prepared.chat_model, &prepared.messages, self.chat_options())
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let frame_chars = self.config.stream_frame_chars.max(1);
        let history = self.history.clone();
        let user_id = user_id.to_string();
        let query = query.to_string();

        tokio::spawn(async move {
            let mut full = String::new();
            let mut pending = String::new();

            while let Some(item) = deltas.recv().await {
                let delta = match item {
                    Ok(delta) => delta,
                    Err(e) => {
                        // No full answer exists, so nothing is persisted.
                        let _ = tx.send(Err(Error::Provider(e))).await;
                        return;
                    }
                };

                full.push_str(&delta.content);
                pending.push_str(&delta.content);

                while pending.chars().count() >= frame_chars {
                    let frame: String = pending.chars().take(frame_chars).collect();
                    pending = pending.chars().skip(frame_chars).collect();
                    if tx.send(Ok(AnswerEvent::Partial { content: frame })).await.is_err() {
                        return;
                    }
                }

                if delta.done {
                    break;
                }
            }

            if !pending.is_empty()
                && tx
                    .send(Ok(AnswerEvent::Partial { content: pending }))
                    .await
                    .is_err()
            {
                return;
            }

            let _ = tx
                .send(Ok(AnswerEvent::Final {
                    content: full.clone(),
                    citations: prepared.citations,
                }))
                .await;

            spawn_persist(
                history,
                user_id,
                query,
                full,
                prepared.embedding_model,
                prepared.query_embedding,
            );
        });

        Ok(rx)
    }
}
