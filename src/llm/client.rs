//! OpenAI-compatible chat completions client
//!
//! Extracts facts and writes replies. Every call degrades to the regex
//! heuristics when the API key is missing or the request fails, so a chat
//! turn never fails because of the LLM.

use crate::{LlmSettings, MemchatError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::heuristics::Heuristics;
use super::{ConversationTurn, FactSource};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_DETAIL_CHARS: usize = 500;

const EXTRACTION_PROMPT: &str = "You extract durable personal facts from a user message. \
Return JSON only with shape: {\"facts\": [\"...\"]}. \
Keep each fact short, objective, and in third person. \
Only include info likely useful later (name, preferences, allergies, routines, goals). \
If nothing useful, return {\"facts\": []}.";

const REPLY_SYSTEM_PROMPT: &str = "You are a helpful, concise assistant in a terminal chat app.";

// ─── Chat Completions API types ─────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FactsPayload {
    #[serde(default)]
    facts: Vec<serde_json::Value>,
}

// ─── Client ─────────────────────────────────────────────────────────

/// LLM client with heuristic fallback
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
    heuristics: Heuristics,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("memchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MemchatError::llm(format!("failed to build HTTP client: {e}")))?;

        if settings.api_key.is_some() {
            info!("LLM enabled: model={}, base_url={}", settings.model, settings.base_url);
        } else {
            info!("No LLM API key configured, using heuristics");
        }

        Ok(Self {
            client,
            settings,
            heuristics: Heuristics::new(),
        })
    }

    /// Whether an API key is configured
    pub fn enabled(&self) -> bool {
        self.settings.api_key.is_some()
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Extract facts worth remembering from a user message.
    ///
    /// Uses the LLM when enabled and its answer parses; heuristics otherwise.
    /// The result is always canonicalised and deduplicated.
    pub async fn extract_facts(&self, user_message: &str) -> Vec<String> {
        if self.enabled() {
            match self.chat(EXTRACTION_PROMPT, user_message).await {
                Ok(output) => match parse_facts_json(&output) {
                    Some(facts) => return self.heuristics.normalize_facts(&facts),
                    None => warn!("LLM returned unparseable facts, using heuristics: {}", output),
                },
                Err(e) => warn!("Fact extraction failed, using heuristics: {}", e),
            }
        }
        let facts = self.heuristics.extract(user_message);
        self.heuristics.normalize_facts(&facts)
    }

    /// Write a reply to `user_message` using remembered facts and recent history.
    ///
    /// `context_facts` go into the prompt in the given order (most relevant
    /// first); `known_facts` are every stored fact, oldest first, and back the
    /// canned answers about name, allergies and friends.
    pub async fn generate_reply(
        &self,
        user_message: &str,
        context_facts: &[String],
        known_facts: &[String],
        history: &[ConversationTurn],
        history_window: usize,
    ) -> String {
        if let Some(reply) = self.heuristics.deterministic_reply(user_message, known_facts) {
            return reply;
        }

        if self.enabled() {
            let prompt = build_reply_prompt(context_facts, history, history_window);
            match self.chat(REPLY_SYSTEM_PROMPT, &prompt).await {
                Ok(reply) if !reply.trim().is_empty() => return reply.trim().to_string(),
                Ok(_) => warn!("LLM returned an empty reply"),
                Err(e) => warn!("Reply generation failed, using fallback: {}", e),
            }
        }

        self.heuristics.fallback_reply(context_facts)
    }

    /// Send one system + user exchange, retrying transient failures.
    pub async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!("Calling LLM with prompt length: {}", user_prompt.len());

        let mut last_err = None;
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = Self::retry_backoff(attempt);
                warn!(
                    "LLM request failed (attempt {}/{}), retrying in {:?}...",
                    attempt, MAX_RETRY_ATTEMPTS, delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_chat_request(system_prompt, user_prompt).await {
                Ok(content) => {
                    let content = strip_think_tags(&content);
                    debug!("LLM response: {}", content);
                    return Ok(content);
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| MemchatError::llm("all retry attempts exhausted")))
    }

    async fn send_chat_request(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| MemchatError::llm("no API key configured"))?;
        let url = format!("{}/chat/completions", self.settings.base_url);

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MemchatError::llm(format!("malformed response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .and_then(|content| content_text(&content))
            .ok_or_else(|| MemchatError::llm("response has no message content"))
    }

    /// Exponential backoff: 200ms, 400ms, ...
    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(exp))
    }
}

impl FactSource for LlmClient {
    async fn extract_candidate_facts(&self, user_message: &str) -> Vec<String> {
        self.extract_facts(user_message).await
    }
}

fn build_reply_prompt(memory_facts: &[String], history: &[ConversationTurn], window: usize) -> String {
    let memory_section = if memory_facts.is_empty() {
        "- (no relevant memories)".to_string()
    } else {
        memory_facts
            .iter()
            .map(|fact| format!("- {}", fact))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let start = history.len().saturating_sub(window);
    let history_section = history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Relevant memories about the user:\n{memory_section}\n\n\
         Recent conversation:\n{history_section}\n\n\
         Now answer the latest USER message naturally. \
         Use memories when relevant, but do not force them into unrelated answers. \
         If safety-related memories exist (like allergies), prioritize them in recommendations."
    )
}

/// Parse `{"facts": [...]}` out of an LLM answer, tolerating code fences.
pub fn parse_facts_json(output: &str) -> Option<Vec<String>> {
    let trimmed = output.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let payload: FactsPayload = serde_json::from_str(body).ok()?;
    Some(
        payload
            .facts
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .map(|fact| fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .collect(),
    )
}

/// Message content is either a string or a list of `{"text": ...}` parts.
fn content_text(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            let joined = joined.trim();
            (!joined.is_empty()).then(|| joined.to_string())
        }
        _ => None,
    }
}

/// Drop `<think>...</think>` reasoning blocks some models prepend.
fn strip_think_tags(content: &str) -> String {
    match (content.find("<think>"), content.find("</think>")) {
        (Some(start), Some(end)) if start < end => {
            let mut out = String::with_capacity(content.len());
            out.push_str(&content[..start]);
            out.push_str(&content[end + "</think>".len()..]);
            out.trim().to_string()
        }
        _ => content.trim().to_string(),
    }
}

/// Network-level failures are worth another attempt, request-building ones are not.
fn transport_error(e: reqwest::Error) -> MemchatError {
    let retryable = e.is_timeout() || e.is_connect() || e.is_request();
    let kind = if e.is_timeout() { "timeout" } else { "network" };
    MemchatError::Llm {
        message: format!("{kind}: {e}"),
        retryable,
    }
}

/// Non-2xx response. 429 and 5xx are retried.
fn api_error(status: StatusCode, body: &str) -> MemchatError {
    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
    let message = match error_detail(body) {
        Some(detail) => format!("API error {status}: {detail}"),
        None => format!("API error {status}"),
    };
    MemchatError::Llm { message, retryable }
}

/// `error.message` or `message` from a JSON error body, else the raw body,
/// capped at `MAX_ERROR_DETAIL_CHARS`.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    let detail = from_json.unwrap_or_else(|| body.to_string());

    if detail.chars().count() <= MAX_ERROR_DETAIL_CHARS {
        return Some(detail);
    }
    let mut capped: String = detail.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
    capped.push_str("...");
    Some(capped)
}
