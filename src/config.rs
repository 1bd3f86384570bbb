//! Configuration loading
//!
//! Precedence, lowest first: built-in defaults, `config.toml` in the memchat
//! home, `.env` files in the working directory, process environment, CLI
//! flags (applied by the binary).

use crate::{MemchatConfig, MemchatError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Partial config.toml parsing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigToml {
    memory: MemorySection,
    llm: LlmSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MemorySection {
    /// Relative paths are resolved against the memchat home
    file: Option<PathBuf>,
    top_k: Option<usize>,
    history_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmSection {
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
}

/// Get the memchat home directory (`MEMCHAT_HOME` or `~/.memchat`)
pub fn memchat_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("MEMCHAT_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| MemchatError::Config("could not find home directory".to_string()))?;
    Ok(home.join(".memchat"))
}

/// Load `KEY=VALUE` pairs from `.env`, then `.env.example`, in `dir`.
///
/// Variables already set in the environment are left alone.
pub fn load_env_files(dir: &Path) {
    for name in [".env", ".env.example"] {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        match dotenvy::from_path(&path) {
            Ok(()) => debug!("Loaded environment from {:?}", path),
            Err(e) => tracing::warn!("Ignoring unreadable env file {:?}: {}", path, e),
        }
    }
}

/// Build the configuration from `config.toml` and the process environment.
///
/// `config_path` overrides `<home>/config.toml`; an explicit path must exist.
pub fn load_config(home: &Path, config_path: Option<&Path>) -> Result<MemchatConfig> {
    let mut config = MemchatConfig::new(home.to_path_buf());

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (home.join("config.toml"), false),
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| MemchatError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        apply_toml(&mut config, home, &content)
            .map_err(|e| MemchatError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {:?}", path);
    } else if required {
        return Err(MemchatError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_toml(config: &mut MemchatConfig, home: &Path, content: &str) -> std::result::Result<(), toml::de::Error> {
    let parsed: ConfigToml = toml::from_str(content)?;

    if let Some(file) = parsed.memory.file {
        config.memory_file = if file.is_absolute() { file } else { home.join(file) };
    }
    if let Some(top_k) = parsed.memory.top_k {
        config.top_k = top_k;
    }
    if let Some(window) = parsed.memory.history_window {
        config.history_window = window;
    }
    if let Some(model) = non_empty(parsed.llm.model) {
        config.llm.model = model;
    }
    if let Some(base_url) = non_empty(parsed.llm.base_url) {
        config.llm.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(temperature) = parsed.llm.temperature {
        config.llm.temperature = temperature;
    }
    Ok(())
}

/// Apply environment overrides, with `lookup` standing in for `std::env::var`.
///
/// Grok variables win over their OpenAI-named equivalents.
pub fn apply_env<F>(config: &mut MemchatConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = first_set(&lookup, &["GROK_API_KEY", "OPENAI_API_KEY"]) {
        config.llm.api_key = Some(key);
    }
    if let Some(model) = first_set(&lookup, &["GROK_MODEL", "OPENAI_MODEL"]) {
        config.llm.model = model;
    }
    if let Some(base_url) = first_set(&lookup, &["LLM_BASE_URL"]) {
        config.llm.base_url = base_url.trim_end_matches('/').to_string();
    }
}

fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| non_empty(lookup(*key)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
