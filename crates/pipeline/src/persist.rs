//! Detached history persistence.
//!
//! The exchange is written after the answer is fully known, on a task
//! that may outlive the request. The caller already has its answer, so
//! a failed write is logged and dropped rather than surfaced.

use quarry_core::turn::{Turn, TurnStore};
use std::sync::Arc;
use tracing::warn;

/// Schedule the user/assistant pair for writing. Both turns share one
/// timestamp so they recall as an intact pair. Returns the task handle,
/// which callers other than tests are free to drop.
pub fn spawn_persist(
    history: Arc<dyn TurnStore>,
    user_id: String,
    query: String,
    answer: String,
    embedding_model: String,
    query_embedding: Vec<f32>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let ts = chrono::Utc::now().timestamp();
        let user_turn =
            Turn::user(&user_id, query, ts).with_embedding(embedding_model, query_embedding);
        let assistant_turn = Turn::assistant(&user_id, answer, ts);

        if let Err(e) = history.append(user_turn).await {
            warn!(user_id = %user_id, error = %e, "Failed to persist user turn");
            return;
        }
        if let Err(e) = history.append(assistant_turn).await {
            warn!(user_id = %user_id, error = %e, "Failed to persist assistant turn");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quarry_core::error::HistoryError;
    use quarry_core::message::Role;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        turns: Mutex<Vec<Turn>>,
        fail: bool,
    }

    #[async_trait]
    impl TurnStore for RecordingStore {
        async fn append(&self, turn: Turn) -> Result<(), HistoryError> {
            if self.fail {
                return Err(HistoryError::Storage("disk full".into()));
            }
            self.turns.lock().unwrap().push(turn);
            Ok(())
        }

        async fn recall(&self, user_id: &str, turns: usize) -> Result<Vec<Turn>, HistoryError> {
            let all = self.turns.lock().unwrap();
            let mine: Vec<Turn> =
                all.iter().filter(|t| t.user_id == user_id).cloned().collect();
            let keep = mine.len().min(turns * 2);
            Ok(mine[mine.len() - keep..].to_vec())
        }
    }

    #[tokio::test]
    async fn writes_the_pair_with_a_shared_timestamp() {
        let store = Arc::new(RecordingStore::default());
        spawn_persist(
            store.clone(),
            "u1".into(),
            "what is the notice period?".into(),
            "three months".into(),
            "mxbai-embed-large".into(),
            vec![0.1, 0.2],
        )
        .await
        .unwrap();

        let turns = store.turns.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].ts, turns[1].ts);
        assert_eq!(turns[0].embedding.as_ref().unwrap(), &vec![0.1, 0.2]);
        assert!(turns[1].embedding.is_none());
    }

    #[tokio::test]
    async fn write_failure_is_swallowed() {
        let store = Arc::new(RecordingStore { fail: true, ..Default::default() });
        // The task completes without panicking; nothing reaches the caller.
        spawn_persist(
            store,
            "u1".into(),
            "q".into(),
            "a".into(),
            "m".into(),
            vec![1.0],
        )
        .await
        .unwrap();
    }
}
