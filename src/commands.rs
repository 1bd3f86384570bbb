//! Chat commands
//!
//! `/new`, `/mem`, `/clear`, `/help` and `/quit`. The bare words `new`, `mem`,
//! `clear`, `help`, `quit` and `exit` are accepted as aliases.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new conversation session (memory stays on disk)
    New,
    /// Show all stored memories
    Mem,
    /// Delete all stored memories
    Clear,
    /// Show the command list
    Help,
    /// Exit
    Quit,
}

impl ChatCommand {
    pub fn all() -> &'static [ChatCommand] {
        &[
            ChatCommand::New,
            ChatCommand::Mem,
            ChatCommand::Clear,
            ChatCommand::Help,
            ChatCommand::Quit,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatCommand::New => "new",
            ChatCommand::Mem => "mem",
            ChatCommand::Clear => "clear",
            ChatCommand::Help => "help",
            ChatCommand::Quit => "quit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChatCommand::New => "Start a new conversation session (memory remains on disk)",
            ChatCommand::Mem => "Show all stored memories",
            ChatCommand::Clear => "Delete all stored memories",
            ChatCommand::Help => "Show this help",
            ChatCommand::Quit => "Exit",
        }
    }

    /// Parse a command name without its slash. `exit` maps to `Quit`.
    pub fn parse(name: &str) -> Option<ChatCommand> {
        let name = name.to_lowercase();
        if name == "exit" {
            return Some(ChatCommand::Quit);
        }
        Self::all().iter().find(|cmd| cmd.name() == name).copied()
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Command(ChatCommand),
    /// Starts with `/` but names no command
    Unknown(String),
    /// Ordinary chat message
    Message(String),
}

/// Classify one line of user input.
///
/// A slash command must be the whole line; a bare alias must be the only word.
pub fn parse_input(input: &str) -> ParsedInput {
    let input = input.trim();

    if let Some(rest) = input.strip_prefix('/') {
        let name = rest.split_whitespace().next().unwrap_or("");
        return match ChatCommand::parse(name) {
            Some(cmd) => ParsedInput::Command(cmd),
            None => ParsedInput::Unknown(name.to_string()),
        };
    }

    match ChatCommand::parse(input) {
        Some(cmd) => ParsedInput::Command(cmd),
        None => ParsedInput::Message(input.to_string()),
    }
}

/// Help text listing every command
pub fn help_text() -> String {
    let mut text = String::from("Commands:\n");
    for cmd in ChatCommand::all() {
        text.push_str(&format!("  {:<7} {}\n", cmd.to_string(), cmd.description()));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(parse_input("/mem"), ParsedInput::Command(ChatCommand::Mem));
        assert_eq!(parse_input("  /CLEAR "), ParsedInput::Command(ChatCommand::Clear));
        assert_eq!(parse_input("/exit"), ParsedInput::Command(ChatCommand::Quit));
        assert_eq!(parse_input("/nope"), ParsedInput::Unknown("nope".to_string()));
    }

    #[test]
    fn test_parse_bare_aliases() {
        assert_eq!(parse_input("new"), ParsedInput::Command(ChatCommand::New));
        assert_eq!(parse_input("Exit"), ParsedInput::Command(ChatCommand::Quit));
        assert_eq!(
            parse_input("clear my head please"),
            ParsedInput::Message("clear my head please".to_string())
        );
    }

    #[test]
    fn test_help_lists_all_commands() {
        let help = help_text();
        for cmd in ChatCommand::all() {
            assert!(help.contains(&cmd.to_string()), "missing {}", cmd);
        }
    }
}
