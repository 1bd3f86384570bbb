//! LLM module for Memchat
//!
//! Turns user messages into candidate facts and writes replies. Uses an
//! OpenAI-compatible chat completions endpoint when an API key is configured
//! and falls back to regex heuristics otherwise.

mod client;
mod heuristics;

pub use client::{parse_facts_json, LlmClient};
pub use heuristics::Heuristics;

use std::future::Future;

/// Anything that can turn a user message into candidate facts.
///
/// Each candidate is a short standalone statement ready for
/// [`MemoryStore::add`](crate::MemoryStore::add).
pub trait FactSource {
    fn extract_candidate_facts(&self, user_message: &str) -> impl Future<Output = Vec<String>> + Send;
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message of the current session (not persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}
