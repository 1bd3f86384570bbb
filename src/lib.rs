//! Memchat - personal fact memory for a conversational agent
//!
//! Extracts durable facts from what the user says, stores them in a flat
//! JSON file and feeds the relevant ones back into replies:
//! - Token-frequency vectors and cosine similarity for lexical recall
//! - Deduplicating, write-through fact store
//! - LLM-backed extraction and replies with a heuristic fallback

pub mod chat;
pub mod commands;
pub mod config;
pub mod llm;
pub mod memory;

pub use chat::{ChatEngine, ChatReply};
pub use llm::{FactSource, LlmClient};
pub use memory::{AddOutcome, FactRecord, MemoryStore, ScoredFact};

use std::path::PathBuf;

/// Default number of facts pulled into a reply's context
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of conversation messages sent to the LLM
pub const DEFAULT_HISTORY_WINDOW: usize = 8;

/// Default model when nothing else is configured
pub const DEFAULT_MODEL: &str = "grok-2-latest";

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";

/// Configuration for Memchat
#[derive(Debug, Clone)]
pub struct MemchatConfig {
    /// Path to the persisted fact file
    pub memory_file: PathBuf,

    /// How many relevant facts to retrieve per message
    pub top_k: usize,

    /// How many recent conversation messages the LLM sees
    pub history_window: usize,

    /// LLM connection settings
    pub llm: LlmSettings,
}

/// Settings for the OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// Bearer token; `None` disables the LLM and forces heuristics
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
        }
    }
}

impl MemchatConfig {
    pub fn new(memchat_home: PathBuf) -> Self {
        Self {
            memory_file: memchat_home.join("memories.json"),
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
            llm: LlmSettings::default(),
        }
    }

    pub fn with_memory_file(mut self, path: PathBuf) -> Self {
        self.memory_file = path;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = llm;
        self
    }
}

/// Result type for Memchat operations
pub type Result<T> = std::result::Result<T, MemchatError>;

/// Errors that can occur in Memchat
#[derive(Debug, thiserror::Error)]
pub enum MemchatError {
    #[error("Memory file {path} is corrupt: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Failed to persist memory file {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("LLM error: {message}")]
    Llm { message: String, retryable: bool },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MemchatError {
    /// LLM failure that another attempt will not fix
    pub fn llm(message: impl Into<String>) -> Self {
        MemchatError::Llm {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether the failed call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemchatError::Llm { retryable: true, .. })
    }
}
