//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and top-k ranking, used by the in-process
//! index. Hosted indexes rank on their side.

use memochat_core::memory::VectorMatch;

/// A stored vector with the text it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: Option<String>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by cosine similarity to `query`, best first, keeping `top_k`.
pub fn top_k_matches(records: &[VectorRecord], query: &[f32], top_k: usize) -> Vec<VectorMatch> {
    let mut scored: Vec<VectorMatch> = records
        .iter()
        .map(|record| VectorMatch {
            id: record.id.clone(),
            score: cosine_similarity(&record.vector, query),
            text: record.text.clone(),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}
