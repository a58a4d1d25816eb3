//! Relevance gating for recalled history.
//!
//! A past exchange only accompanies a new question when the stored user
//! turn is semantically close to it. The walk goes newest pair first and
//! stops at the first pair that fails the gate: once the conversation
//! drifts to another topic, everything older is assumed off-topic too.

use quarry_core::message::Role;
use quarry_core::turn::Turn;
use quarry_core::vector::cosine_similarity;
use tracing::debug;

/// A user turn and the assistant reply that followed it.
#[derive(Debug, Clone)]
struct Pair<'a> {
    user: &'a Turn,
    assistant: &'a Turn,
}

/// Group chronological turns into user/assistant pairs.
///
/// A trailing user turn with no reply yet, or an assistant turn with no
/// preceding question (possible after partial persistence), is skipped.
fn pair_up(turns: &[Turn]) -> Vec<Pair<'_>> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i < turns.len() {
        if turns[i].role == Role::User {
            if let Some(next) = turns.get(i + 1) {
                if next.role == Role::Assistant {
                    pairs.push(Pair { user: &turns[i], assistant: next });
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    pairs
}

/// Select the past exchanges relevant to the current question.
///
/// `turns` must be in chronological order, as returned by recall. A pair
/// passes the gate when its user turn carries an embedding produced by
/// `active_model` and that embedding's cosine similarity to
/// `query_embedding` meets `threshold`. The walk is newest first, stops
/// at the first failing pair, and keeps at most `max_pairs` pairs.
///
/// Returns the surviving turns flattened back into chronological order.
pub fn filter_relevant_pairs(
    turns: &[Turn],
    query_embedding: &[f32],
    active_model: &str,
    threshold: f32,
    max_pairs: usize,
) -> Vec<Turn> {
    let pairs = pair_up(turns);
    let mut kept: Vec<&Pair<'_>> = Vec::new();

    for pair in pairs.iter().rev() {
        if kept.len() >= max_pairs {
            break;
        }

        let passes = pair
            .user
            .embedding
            .as_deref()
            .filter(|_| pair.user.embedding_model.as_deref() == Some(active_model))
            .map(|embedding| cosine_similarity(embedding, query_embedding))
            .is_some_and(|similarity| similarity >= threshold);

        if !passes {
            break;
        }
        kept.push(pair);
    }

    debug!(
        recalled_pairs = pairs.len(),
        kept_pairs = kept.len(),
        "History relevance gate"
    );

    kept.iter()
        .rev()
        .flat_map(|pair| [pair.user.clone(), pair.assistant.clone()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "mxbai-embed-large";

    fn pair(n: i64, embedding: Vec<f32>) -> [Turn; 2] {
        [
            Turn::user("u1", format!("q{n}"), n * 10).with_embedding(MODEL, embedding),
            Turn::assistant("u1", format!("a{n}"), n * 10),
        ]
    }

    #[test]
    fn walk_stops_at_first_offtopic_pair() {
        // Newest pair on-topic, middle pair off-topic, oldest on-topic.
        // Only the newest survives: the walk stops at the middle pair.
        let query = vec![1.0, 0.0];
        let turns: Vec<Turn> = [
            pair(1, vec![1.0, 0.0]),
            pair(2, vec![0.0, 1.0]),
            pair(3, vec![0.95, 0.05]),
        ]
        .into_iter()
        .flatten()
        .collect();

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.92, 4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "q3");
        assert_eq!(kept[1].content, "a3");
    }

    #[test]
    fn all_matching_pairs_survive_in_order() {
        let query = vec![1.0, 0.0];
        let turns: Vec<Turn> = [pair(1, vec![1.0, 0.0]), pair(2, vec![1.0, 0.1])]
            .into_iter()
            .flatten()
            .collect();

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.85, 4);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].content, "q1");
        assert_eq!(kept[3].content, "a2");
    }

    #[test]
    fn max_pairs_caps_the_walk() {
        let query = vec![1.0, 0.0];
        let turns: Vec<Turn> = (1..=5)
            .flat_map(|n| pair(n, vec![1.0, 0.0]))
            .collect();

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.85, 2);
        assert_eq!(kept.len(), 4);
        // The two newest pairs, chronological.
        assert_eq!(kept[0].content, "q4");
        assert_eq!(kept[2].content, "q5");
    }

    #[test]
    fn foreign_model_embedding_fails_the_gate() {
        let query = vec![1.0, 0.0];
        let turns = vec![
            Turn::user("u1", "q1", 10).with_embedding("retired-model", vec![1.0, 0.0]),
            Turn::assistant("u1", "a1", 10),
        ];

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.85, 4);
        assert!(kept.is_empty());
    }

    #[test]
    fn missing_embedding_fails_the_gate() {
        let query = vec![1.0, 0.0];
        let turns = vec![Turn::user("u1", "q1", 10), Turn::assistant("u1", "a1", 10)];

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.85, 4);
        assert!(kept.is_empty());
    }

    #[test]
    fn dangling_user_turn_is_skipped() {
        let query = vec![1.0, 0.0];
        let mut turns: Vec<Turn> = pair(1, vec![1.0, 0.0]).into();
        // A question whose answer has not been persisted yet.
        turns.push(Turn::user("u1", "pending", 99).with_embedding(MODEL, vec![1.0, 0.0]));

        let kept = filter_relevant_pairs(&turns, &query, MODEL, 0.85, 4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "q1");
    }

    #[test]
    fn empty_history_is_empty() {
        assert!(filter_relevant_pairs(&[], &[1.0], MODEL, 0.85, 4).is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        // cos([1,1],[1,0]) ≈ 0.7071
        let query = vec![1.0, 0.0];
        let turns: Vec<Turn> = pair(1, vec![1.0, 1.0]).into();

        assert_eq!(filter_relevant_pairs(&turns, &query, MODEL, 0.7071, 4).len(), 2);
        assert!(filter_relevant_pairs(&turns, &query, MODEL, 0.71, 4).is_empty());
    }
}
