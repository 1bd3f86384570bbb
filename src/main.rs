//! Memchat CLI
//!
//! A terminal chat that remembers facts about the user across sessions.

use clap::{Parser, Subcommand};
use memchat::commands::help_text;
use memchat::config::{load_config, load_env_files, memchat_home};
use memchat::{AddOutcome, ChatEngine, MemchatConfig, MemoryStore};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Memchat - chat with an assistant that remembers you
#[derive(Parser, Debug)]
#[command(name = "memchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the memory file (default: ~/.memchat/memories.json)
    #[arg(long, global = true)]
    memory_file: Option<PathBuf>,

    /// Path to config.toml (default: ~/.memchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output: debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// List stored memories
    Mem,
    /// Show the memories most relevant to a query
    Search {
        /// Query text
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = memchat::DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Store a fact directly
    Add {
        /// Fact text
        #[arg(required = true, trailing_var_arg = true)]
        fact: Vec<String>,

        /// Message the fact came from
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Delete all stored memories
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()?;
    load_env_files(&cwd);

    let home = memchat_home()?;
    let mut config = load_config(&home, cli.config.as_deref())?;
    if let Some(memory_file) = cli.memory_file {
        config = config.with_memory_file(memory_file);
    }
    debug!("Memory file: {:?}", config.memory_file);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Mem => list_memories(&config),
        Command::Search { query, top_k } => search_memories(&config, &query.join(" "), top_k),
        Command::Add { fact, source } => add_memory(&config, &fact.join(" "), &source),
        Command::Clear => clear_memories(&config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run_chat(config: MemchatConfig) -> anyhow::Result<()> {
    let mut engine = ChatEngine::new(&config)?;

    println!("AI Memory Chatbot");
    print!("{}", help_text());
    let llm = engine.llm().settings();
    if engine.llm().enabled() {
        println!("LLM mode: enabled ({} via {})", llm.model, llm.base_url);
    } else {
        println!("LLM mode: no API key found (set GROK_API_KEY); using fallback behavior");
    }

    // Spawn blocking thread to read from stdin
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = line_rx.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye.");
            return Ok(());
        };

        let turn = match engine.handle_input(&line).await {
            Ok(turn) => turn,
            Err(e) => {
                println!("AI: Error: {}", e);
                continue;
            }
        };

        println!("AI: {}", turn.reply.trim_end());
        if let Some(err) = &turn.save_error {
            println!("[memory] failed to save facts: {}", err);
        } else if turn.saved > 0 {
            println!("[memory] saved {} new fact(s)", turn.saved);
        }
        if turn.quit {
            return Ok(());
        }
    }
}

fn list_memories(config: &MemchatConfig) -> anyhow::Result<()> {
    let store = MemoryStore::load(config.memory_file.clone())?;
    if store.is_empty() {
        println!("No memories saved yet.");
        return Ok(());
    }
    for (idx, record) in store.list_all().iter().enumerate() {
        println!(
            "{:>3}. {}  ({})",
            idx + 1,
            record.text,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn search_memories(config: &MemchatConfig, query: &str, top_k: usize) -> anyhow::Result<()> {
    let store = MemoryStore::load(config.memory_file.clone())?;
    let results = store.retrieve_scored(query, top_k);
    if results.is_empty() {
        println!("No relevant memories.");
        return Ok(());
    }
    for scored in results {
        println!("{:.3}  {}", scored.score, scored.record.text);
    }
    Ok(())
}

fn add_memory(config: &MemchatConfig, fact: &str, source: &str) -> anyhow::Result<()> {
    let mut store = MemoryStore::load(config.memory_file.clone())?;
    match store.add(fact, source)? {
        AddOutcome::Added => println!("Saved: {}", fact.trim()),
        AddOutcome::AlreadyPresent => println!("Already remembered."),
        AddOutcome::Empty => println!("Nothing to save."),
    }
    Ok(())
}

fn clear_memories(config: &MemchatConfig) -> anyhow::Result<()> {
    let mut store = MemoryStore::load_or_recover(config.memory_file.clone())?;
    let count = store.len();
    store.clear()?;
    println!("Cleared {} memories.", count);
    Ok(())
}
