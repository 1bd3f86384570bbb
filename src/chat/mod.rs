//! Chat engine
//!
//! Drives one conversation: retrieve relevant facts, generate a reply,
//! extract new facts from the user's message and store them. The session
//! history lives in memory only; facts survive in the [`MemoryStore`].

use crate::commands::{help_text, parse_input, ChatCommand, ParsedInput};
use crate::llm::{ConversationTurn, FactSource, LlmClient};
use crate::memory::MemoryStore;
use crate::{MemchatConfig, Result};
use tracing::{debug, warn};

/// Outcome of one line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Text to show the user
    pub reply: String,
    /// Facts newly stored from this message
    pub saved: usize,
    /// Set when extracted facts could not be written to disk
    pub save_error: Option<String>,
    /// The user asked to exit
    pub quit: bool,
}

impl ChatReply {
    fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            saved: 0,
            save_error: None,
            quit: false,
        }
    }
}

pub struct ChatEngine {
    store: MemoryStore,
    llm: LlmClient,
    history: Vec<ConversationTurn>,
    top_k: usize,
    history_window: usize,
}

impl ChatEngine {
    /// Open the memory file (moving a corrupt one aside) and set up the LLM.
    pub fn new(config: &MemchatConfig) -> Result<Self> {
        let store = MemoryStore::load_or_recover(config.memory_file.clone())?;
        let llm = LlmClient::new(config.llm.clone())?;
        Ok(Self::with_parts(store, llm, config.top_k, config.history_window))
    }

    pub fn with_parts(store: MemoryStore, llm: LlmClient, top_k: usize, history_window: usize) -> Self {
        Self {
            store,
            llm,
            history: Vec::new(),
            top_k,
            history_window,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Facts for the reply prompt: the most relevant first, then the rest.
    pub fn context_facts(&self, message: &str) -> Vec<String> {
        let mut facts: Vec<String> = Vec::with_capacity(self.store.len());
        let relevant = self.store.retrieve(message, self.top_k);
        for record in relevant.into_iter().chain(self.store.list_all()) {
            if !facts.contains(&record.text) {
                facts.push(record.text.clone());
            }
        }
        facts
    }

    /// Forget the conversation, keep the facts.
    pub fn new_session(&mut self) -> String {
        self.history.clear();
        "Started a new session. I still remember past saved facts.".to_string()
    }

    /// Delete every stored fact and the conversation.
    pub fn clear_memories(&mut self) -> Result<String> {
        self.store.clear()?;
        self.history.clear();
        Ok("Cleared all saved memories.".to_string())
    }

    pub fn list_memories(&self) -> Vec<String> {
        self.store.list_all().iter().map(|r| r.text.clone()).collect()
    }

    /// Handle one line: a command or a chat message.
    pub async fn handle_input(&mut self, input: &str) -> Result<ChatReply> {
        match parse_input(input) {
            ParsedInput::Command(cmd) => self.handle_command(cmd),
            ParsedInput::Unknown(name) => Ok(ChatReply::text(format!(
                "Unknown command /{}. Type /help for commands.",
                name
            ))),
            ParsedInput::Message(message) if message.is_empty() => Ok(ChatReply::text(
                "Please type a message, or use /quit to exit.",
            )),
            ParsedInput::Message(message) => Ok(self.handle_message(&message).await),
        }
    }

    fn handle_command(&mut self, cmd: ChatCommand) -> Result<ChatReply> {
        debug!("Handling command {}", cmd);
        let reply = match cmd {
            ChatCommand::New => ChatReply::text(self.new_session()),
            ChatCommand::Clear => ChatReply::text(self.clear_memories()?),
            ChatCommand::Help => ChatReply::text(help_text()),
            ChatCommand::Mem => ChatReply::text(self.format_memories()),
            ChatCommand::Quit => ChatReply {
                quit: true,
                ..ChatReply::text("Goodbye.")
            },
        };
        Ok(reply)
    }

    fn format_memories(&self) -> String {
        let facts = self.list_memories();
        if facts.is_empty() {
            return "No memories saved yet.".to_string();
        }
        let mut text = String::from("Stored memories:");
        for (idx, fact) in facts.iter().enumerate() {
            text.push_str(&format!("\n  {}. {}", idx + 1, fact));
        }
        text
    }

    async fn handle_message(&mut self, message: &str) -> ChatReply {
        let facts = self.context_facts(message);
        let known = self.list_memories();

        self.history.push(ConversationTurn::user(message));
        let reply = self
            .llm
            .generate_reply(message, &facts, &known, &self.history, self.history_window)
            .await;
        self.history.push(ConversationTurn::assistant(reply.clone()));

        let extracted = self.llm.extract_candidate_facts(message).await;
        debug!("Extracted {} candidate facts", extracted.len());

        let (saved, save_error) = match self.store.add_facts(&extracted, message) {
            Ok(saved) => (saved, None),
            Err(e) => {
                warn!("Failed to save facts: {}", e);
                (0, Some(e.to_string()))
            }
        };

        ChatReply {
            reply,
            saved,
            save_error,
            quit: false,
        }
    }
}
