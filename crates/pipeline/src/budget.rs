//! Token estimation and context-window allocation.
//!
//! The window of the active chat model is split, in priority order,
//! between the system prompt (always whole), the gated history turns
//! (oldest of the recalled window first), the retrieved context blocks
//! (in rank order), and a fixed reserve left for the model's own output.
//! Turns and blocks are never split: the first unit that does not fit
//! ends its phase.

use quarry_core::turn::Turn;

/// Turns text into an approximate token count.
///
/// The estimate only has to be consistent, not exact; budgets are
/// computed and compared with the same estimator throughout a request.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> u32;
}

/// The classic one-token-per-four-characters heuristic. Crude but fast
/// and deterministic; swap in a real tokenizer behind the same trait if
/// budgets ever need to be exact.
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> u32 {
        (text.chars().count() / 4) as u32
    }
}

/// How a context window was allocated for one request.
#[derive(Debug)]
pub struct BudgetPlan {
    pub history: Vec<Turn>,
    pub blocks: Vec<String>,
    pub history_tokens: u32,
    pub block_tokens: u32,
}

/// Allocate `window` tokens (already net of system prompt, user prompt
/// scaffolding, and the answer reserve) across history turns and context
/// blocks.
pub fn plan(
    estimator: &dyn TokenEstimator,
    window: u32,
    history: &[Turn],
    blocks: &[String],
) -> BudgetPlan {
    let (history, history_tokens) = fit_turns(estimator, history, window);
    let remaining = window.saturating_sub(history_tokens);
    let (blocks, block_tokens) = fit_blocks(estimator, blocks, remaining);

    BudgetPlan { history, blocks, history_tokens, block_tokens }
}

/// Keep whole turns, oldest first, until the next would exceed `budget`.
pub fn fit_turns(
    estimator: &dyn TokenEstimator,
    turns: &[Turn],
    budget: u32,
) -> (Vec<Turn>, u32) {
    let mut kept = Vec::new();
    let mut total = 0u32;

    for turn in turns {
        let cost = estimator.estimate(&turn.content);
        if total + cost > budget {
            break;
        }
        kept.push(turn.clone());
        total += cost;
    }

    (kept, total)
}

/// Keep whole blocks in their ranked order until the next would exceed
/// `budget`.
pub fn fit_blocks(
    estimator: &dyn TokenEstimator,
    blocks: &[String],
    budget: u32,
) -> (Vec<String>, u32) {
    let mut kept = Vec::new();
    let mut total = 0u32;

    for block in blocks {
        let cost = estimator.estimate(block);
        if total + cost > budget {
            break;
        }
        kept.push(block.clone());
        total += cost;
    }

    (kept, total)
}
