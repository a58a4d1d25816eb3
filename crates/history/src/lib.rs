//! # Quarry History
//!
//! The append-only conversation turn log (SQLite) and the relevance
//! gate that decides which past exchanges accompany a new question.

pub mod relevance;
pub mod sqlite;

pub use relevance::filter_relevant_pairs;
pub use sqlite::SqliteTurnStore;
