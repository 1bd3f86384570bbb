//! Integration tests for the Memchat memory layer

use memchat::memory::{cosine_similarity, vectorize};
use memchat::{AddOutcome, ChatEngine, LlmClient, LlmSettings, MemchatConfig, MemoryStore};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

fn memory_path(dir: &TempDir) -> PathBuf {
    dir.path().join("memories.json")
}

fn seeded_store(dir: &TempDir) -> MemoryStore {
    let mut store = MemoryStore::load(memory_path(dir)).unwrap();
    for fact in [
        "User is allergic to peanuts",
        "User's name is Priya",
        "User loves Italian food",
    ] {
        assert_eq!(store.add(fact, "seed").unwrap(), AddOutcome::Added);
    }
    store
}

/// Self-similarity is exact and the measure is symmetric
#[test]
fn test_similarity_properties() {
    let samples = [
        "User is allergic to peanuts",
        "What should I eat?",
        "pasta pasta pizza",
        "x",
    ];
    for a in samples {
        let va = vectorize(a);
        assert_eq!(cosine_similarity(&va, &va), 1.0);
        for b in samples {
            let vb = vectorize(b);
            assert_eq!(cosine_similarity(&va, &vb), cosine_similarity(&vb, &va));
            let sim = cosine_similarity(&va, &vb);
            assert!((0.0..=1.0).contains(&sim));
        }
    }
}

/// Loading a missing file gives an empty store without creating anything
#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::load(memory_path(&temp_dir)).unwrap();
    assert!(store.list_all().is_empty());
    assert!(!memory_path(&temp_dir).exists());
}

/// Duplicates differing only in case and whitespace are stored once
#[test]
fn test_duplicate_facts_stored_once() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = MemoryStore::load(memory_path(&temp_dir)).unwrap();

    assert_eq!(store.add("User likes green tea", "").unwrap(), AddOutcome::Added);
    assert_eq!(
        store.add("  USER likes\tgreen   TEA ", "").unwrap(),
        AddOutcome::AlreadyPresent
    );

    let reloaded = MemoryStore::load(memory_path(&temp_dir)).unwrap();
    assert_eq!(reloaded.len(), 1);
}

/// Save then load reproduces the exact record sequence
#[test]
fn test_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = seeded_store(&temp_dir);

    let reloaded = MemoryStore::load(memory_path(&temp_dir)).unwrap();
    assert_eq!(reloaded.list_all(), store.list_all());
}

/// Persisted layout is an array of {text, created_at, source_message}
#[test]
fn test_file_layout() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = MemoryStore::load(memory_path(&temp_dir)).unwrap();
    store.add("User likes tea", "I like tea").unwrap();

    let content = std::fs::read_to_string(memory_path(&temp_dir)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 1);

    let record = records[0].as_object().unwrap();
    assert_eq!(record.len(), 3);
    assert_eq!(record["text"], "User likes tea");
    assert_eq!(record["source_message"], "I like tea");
    let created_at = record["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
}

/// The allergy fact is the only one sharing tokens with the query
#[test]
fn test_allergy_query_ranks_allergy_first() {
    let temp_dir = TempDir::new().unwrap();
    let store = seeded_store(&temp_dir);

    let results = store.retrieve("peanuts allergic", 5);
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["User is allergic to peanuts"]);

    // Lexical only: "allergy" does not match "allergic"
    assert!(store.retrieve("allergy information", 5).is_empty());
}

/// Food queries find the food preference
#[test]
fn test_food_query() {
    let temp_dir = TempDir::new().unwrap();
    let store = seeded_store(&temp_dir);

    let results = store.retrieve("Any good Italian food nearby?", 5);
    assert_eq!(results[0].text, "User loves Italian food");
}

/// retrieve never exceeds k, never returns zero scores, and orders by score
#[test]
fn test_retrieve_bounds_and_order() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = seeded_store(&temp_dir);
    store.add("User's sister is named Asha", "").unwrap();

    assert!(store.retrieve("anything", 0).is_empty());

    let all = store.retrieve_scored("User", 10);
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|s| s.score > 0.0));
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

    let top_two = store.retrieve("User", 2);
    assert_eq!(top_two.len(), 2);
}

/// Clearing empties both memory and the file
#[test]
fn test_clear() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = seeded_store(&temp_dir);

    store.clear().unwrap();
    assert!(store.list_all().is_empty());

    let content = std::fs::read_to_string(memory_path(&temp_dir)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json, serde_json::json!([]));
    assert!(MemoryStore::load(memory_path(&temp_dir)).unwrap().is_empty());
}

/// Facts told in one session are used in the next
#[tokio::test]
async fn test_chat_remembers_across_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let config = MemchatConfig::new(temp_dir.path().to_path_buf());

    let mut engine = ChatEngine::new(&config).unwrap();
    let turn = engine
        .handle_input("Hi, I'm Priya. I'm allergic to peanuts.")
        .await
        .unwrap();
    assert_eq!(turn.saved, 2);
    drop(engine);

    let mut engine = ChatEngine::new(&config).unwrap();
    let turn = engine.handle_input("What's my name?").await.unwrap();
    assert_eq!(turn.reply, "Your name is Priya.");
    assert_eq!(turn.saved, 0);

    let turn = engine.handle_input("What am I allergic to?").await.unwrap();
    assert_eq!(turn.reply, "You told me you are allergic to peanuts.");
}

/// A corrupt memory file is moved aside when the chat starts
#[tokio::test]
async fn test_chat_recovers_from_corrupt_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = MemchatConfig::new(temp_dir.path().to_path_buf());
    std::fs::write(&config.memory_file, "[{\"broken\": true}]").unwrap();

    assert!(MemoryStore::load(config.memory_file.clone()).is_err());

    let engine = ChatEngine::new(&config).unwrap();
    assert!(engine.store().is_empty());
}

/// Engine built from parts uses the given store and top_k
#[tokio::test]
async fn test_engine_from_parts() {
    let temp_dir = TempDir::new().unwrap();
    let store = seeded_store(&temp_dir);
    let llm = LlmClient::new(LlmSettings::default()).unwrap();
    let engine = ChatEngine::with_parts(store, llm, 1, 8);

    let facts = engine.context_facts("Italian");
    assert_eq!(facts[0], "User loves Italian food");
    assert_eq!(facts.len(), 3);
}
