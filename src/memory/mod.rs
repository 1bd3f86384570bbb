//! Memory module for Memchat
//!
//! Provides the lexical similarity engine and the persistent fact store.

mod similarity;
mod store;

pub use similarity::{cosine_similarity, score, tokenize, vectorize, TermVector};
pub use store::{dedup_key, normalize_text, AddOutcome, FactRecord, MemoryStore, ScoredFact};
