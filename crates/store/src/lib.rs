//! # Quarry Store
//!
//! Vector store implementations:
//! - `ChromaStore` — Chroma over its REST API (production)
//! - `InMemoryStore` — cosine ranking over an in-process vec (tests, dev)
//! - `StoreCell` — swap coordinator so the active store can be replaced
//!   at runtime when the embedding model changes

pub mod cell;
pub mod chroma;
pub mod memory;

pub use cell::StoreCell;
pub use chroma::ChromaStore;
pub use memory::InMemoryStore;
