//! Token-frequency vectors and cosine similarity.
//!
//! Retrieval is purely lexical: synonyms and inflections ("allergy" vs
//! "allergic") do not match.

use std::collections::HashMap;

/// Sparse vector: distinct lowercase token -> occurrence count
pub type TermVector = HashMap<String, u32>;

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Count token occurrences in `text`.
pub fn vectorize(text: &str) -> TermVector {
    let mut vector = TermVector::new();
    for token in tokenize(text) {
        *vector.entry(token).or_insert(0) += 1;
    }
    vector
}

/// Cosine similarity between two term vectors, in `[0, 1]`.
///
/// Returns 0 when either vector is empty. Dot product and squared norms stay
/// integral until the final division, so `sim(a, a)` is exactly 1 and
/// `sim(a, b) == sim(b, a)`.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: u64 = small
        .iter()
        .filter_map(|(token, &count)| large.get(token).map(|&other| count as u64 * other as u64))
        .sum();
    if dot == 0 {
        return 0.0;
    }

    let norm_a = squared_norm(a) as f64;
    let norm_b = squared_norm(b) as f64;
    (dot as f64 / (norm_a * norm_b).sqrt()).min(1.0)
}

fn squared_norm(vector: &TermVector) -> u64 {
    vector.values().map(|&c| c as u64 * c as u64).sum()
}

/// Score `text` against an already vectorized query.
pub fn score(query: &TermVector, text: &str) -> f64 {
    cosine_similarity(query, &vectorize(text))
}
