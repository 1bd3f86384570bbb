//! Durable fact store backed by a single JSON file.
//!
//! Every mutating call rewrites the whole file through a temp file and a
//! rename, so the file on disk always holds a complete record sequence.

use crate::{MemchatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::similarity::{score, vectorize};

/// A single remembered fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    /// The fact itself, trimmed and whitespace-collapsed
    #[serde(alias = "fact")]
    pub text: String,

    /// When the fact was first stored
    pub created_at: DateTime<Utc>,

    /// The user message the fact came from (may be empty)
    #[serde(alias = "source_user_message")]
    pub source_message: String,
}

impl FactRecord {
    /// Key used to detect duplicates: lowercase, whitespace-collapsed.
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.text)
    }
}

/// A record together with its relevance to a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredFact<'a> {
    pub record: &'a FactRecord,
    pub score: f64,
}

/// What happened to a fact passed to [`MemoryStore::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored and persisted
    Added,
    /// A fact with the same dedup key already exists
    AlreadyPresent,
    /// Nothing left after trimming
    Empty,
}

/// Trim and collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive, whitespace-insensitive comparison key.
pub fn dedup_key(text: &str) -> String {
    normalize_text(text).to_lowercase()
}

/// Ordered, deduplicated collection of facts mirrored to disk
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    records: Vec<FactRecord>,
}

impl MemoryStore {
    /// Load the store from `path`.
    ///
    /// A missing or blank file is an empty store. Anything that does not parse
    /// as a valid record sequence is reported as [`MemchatError::CorruptStore`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No memory file at {:?}, starting empty", path);
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(e.into()),
        };
        let content = String::from_utf8(bytes).map_err(|e| MemchatError::CorruptStore {
            path: path.clone(),
            reason: format!("not valid UTF-8: {}", e.utf8_error()),
        })?;

        let records = Self::parse_records(&path, &content)?;
        info!("Loaded {} facts from {:?}", records.len(), path);
        Ok(Self { path, records })
    }

    /// Like [`MemoryStore::load`], but a corrupt file is moved aside to
    /// `<name>.corrupt-<timestamp>` and the store starts empty.
    pub fn load_or_recover(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Self::load(path.clone()) {
            Err(MemchatError::CorruptStore { reason, .. }) => {
                let backup = Self::backup_path(&path);
                warn!(
                    "Memory file {:?} is corrupt ({}), moving it to {:?}",
                    path, reason, backup
                );
                fs::rename(&path, &backup).map_err(|source| MemchatError::Persistence {
                    path: backup.clone(),
                    source,
                })?;
                Ok(Self::empty(path))
            }
            other => other,
        }
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            records: Vec::new(),
        }
    }

    fn parse_records(path: &Path, content: &str) -> Result<Vec<FactRecord>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let corrupt = |reason: String| MemchatError::CorruptStore {
            path: path.to_path_buf(),
            reason,
        };

        let records: Vec<FactRecord> =
            serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;

        let mut seen = HashSet::new();
        for (index, record) in records.iter().enumerate() {
            if record.text.trim().is_empty() {
                return Err(corrupt(format!("record {} has empty text", index)));
            }
            if !seen.insert(record.dedup_key()) {
                return Err(corrupt(format!(
                    "record {} duplicates an earlier fact: {:?}",
                    index, record.text
                )));
            }
        }

        Ok(records)
    }

    /// Add one fact. Persists before returning when the fact is new.
    pub fn add(&mut self, fact_text: &str, source_message: &str) -> Result<AddOutcome> {
        let text = normalize_text(fact_text);
        if text.is_empty() {
            return Ok(AddOutcome::Empty);
        }

        let key = text.to_lowercase();
        if self.records.iter().any(|r| r.dedup_key() == key) {
            debug!("Fact already present: {}", text);
            return Ok(AddOutcome::AlreadyPresent);
        }

        let mut next = self.records.clone();
        next.push(FactRecord {
            text,
            created_at: Utc::now(),
            source_message: source_message.to_string(),
        });
        self.commit(next)?;
        Ok(AddOutcome::Added)
    }

    /// Add a batch of facts with a single write. Returns how many were new.
    pub fn add_facts<S: AsRef<str>>(&mut self, facts: &[S], source_message: &str) -> Result<usize> {
        let mut keys: HashSet<String> = self.records.iter().map(FactRecord::dedup_key).collect();
        let mut next = self.records.clone();
        let now = Utc::now();

        for fact in facts {
            let text = normalize_text(fact.as_ref());
            if text.is_empty() || !keys.insert(text.to_lowercase()) {
                continue;
            }
            next.push(FactRecord {
                text,
                created_at: now,
                source_message: source_message.to_string(),
            });
        }

        let added = next.len() - self.records.len();
        if added > 0 {
            self.commit(next)?;
        }
        Ok(added)
    }

    /// The `k` most relevant facts for `query`, best first.
    ///
    /// Facts with no shared token (score 0) are never returned. Equal scores
    /// keep insertion order.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<&FactRecord> {
        self.retrieve_scored(query, k)
            .into_iter()
            .map(|scored| scored.record)
            .collect()
    }

    /// Same as [`MemoryStore::retrieve`], with scores attached.
    pub fn retrieve_scored(&self, query: &str, k: usize) -> Vec<ScoredFact<'_>> {
        if k == 0 {
            return Vec::new();
        }
        let query_vector = vectorize(query);
        if query_vector.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredFact<'_>> = self
            .records
            .iter()
            .filter_map(|record| {
                let relevance = score(&query_vector, &record.text);
                (relevance > 0.0).then_some(ScoredFact {
                    record,
                    score: relevance,
                })
            })
            .collect();

        // sort_by is stable, which keeps insertion order on ties
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// All facts in insertion order.
    pub fn list_all(&self) -> &[FactRecord] {
        &self.records
    }

    /// Remove every fact, on disk and in memory.
    pub fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new())?;
        info!("Cleared memory file {:?}", self.path);
        Ok(())
    }

    /// Number of stored facts
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no facts are stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next`, then adopt it. On failure the current records stay.
    fn commit(&mut self, next: Vec<FactRecord>) -> Result<()> {
        Self::write_atomic(&self.path, &next)?;
        debug!("Persisted {} facts to {:?}", next.len(), self.path);
        self.records = next;
        Ok(())
    }

    fn write_atomic(path: &Path, records: &[FactRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        let persistence = |source| MemchatError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }

        let tmp_path = Self::sibling_path(path, ".tmp");
        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp_path, path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persistence(e));
        }
        Ok(())
    }

    fn backup_path(path: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        Self::sibling_path(path, &format!(".corrupt-{}", stamp))
    }

    fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
        let mut name: OsString = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("memories.json"));
        name.push(suffix);
        path.with_file_name(name)
    }
}
