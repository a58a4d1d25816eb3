//! Prompt assembly.
//!
//! One system message pinning the answer to the provided context, the
//! gated history turns in chronological order, then a single user
//! message carrying the literal question, the joined context blocks,
//! and the formatting instructions. Two fully localized template
//! variants; the language tag is matched by prefix and anything
//! unrecognized falls back to English.

use quarry_core::message::PromptMessage;
use quarry_core::turn::Turn;

/// Separator between context blocks inside the user message.
pub const CONTEXT_JOINER: &str = " --- ";

fn is_ukrainian(lang: &str) -> bool {
    lang.to_lowercase().starts_with("uk")
}

/// The grounding system prompt for the requested language.
pub fn system_prompt(lang: &str) -> &'static str {
    if is_ukrainian(lang) {
        "Ти — корисний помічник для пошуку по документах українською. \
         Відповідай ЛИШЕ на основі наданого контексту. \
         Якщо відповіді немає у контексті — скажи, що не знаєш. \
         Наприкінці за можливості наведи назви файлів (цитації)."
    } else {
        "You are a helpful assistant for document QA. \
         Answer ONLY using the provided context; if not present, say you don't know. \
         Cite filenames when applicable."
    }
}

/// The user message: question, joined context, formatting instructions.
pub fn user_prompt(query: &str, ctx_blocks: &[String], lang: &str) -> String {
    let context = ctx_blocks.join(CONTEXT_JOINER);
    if is_ukrainian(lang) {
        format!(
            "Питання: {query}\n\
             Контекст: {context}\n\n\
             Відповідай лише на основі контексту. \
             Надай повну, структуровану відповідь. \
             Якщо відповідь містить перелік — наведи всі пункти списком. \
             Не вигадуй нічого поза контекстом. \
             Не зупиняйся раніше, ніж наведеш усі релевантні факти з контексту. \
             Наприкінці за можливості наведи назви файлів (цитації)."
        )
    } else {
        format!(
            "Question: {query}\n\
             Context: {context}\n\n\
             Answer only using the context. \
             Provide a complete and structured response. \
             If the answer involves a list — include all items. \
             Do not make anything up beyond the context. \
             Do not stop until all relevant facts from the context are covered. \
             Cite filenames when applicable."
        )
    }
}

/// Scaffolding cost of the user message: everything except the context
/// blocks themselves. Used to size the context budget.
pub fn user_prompt_scaffold(query: &str, lang: &str) -> String {
    user_prompt(query, &[], lang)
}

/// Build the final ordered message sequence.
pub fn assemble(
    query: &str,
    ctx_blocks: &[String],
    history: &[Turn],
    lang: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system_prompt(lang)));
    for turn in history {
        messages.push(PromptMessage { role: turn.role, content: turn.content.clone() });
    }
    messages.push(PromptMessage::user(user_prompt(query, ctx_blocks, lang)));
    messages
}
