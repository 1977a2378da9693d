//! Cosine similarity and Maximal Marginal Relevance re-ranking.

use tracing::debug;

use crate::domain::Chunk;

/// Cosine similarity between two embedding vectors, in [-1, 1].
/// Empty, mismatched, or zero-norm inputs yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0)
}

/// MMR = argmax[λ · sim(c, q) − (1 − λ) · max sim(c, s) for s in selected].
///
/// Iteratively picks the candidate that best balances relevance to the query
/// against similarity to what has already been selected. Returns
/// `min(top_k, candidates.len())` chunks, each at most once.
pub fn mmr_rerank(
    query_embedding: &[f32],
    candidates: Vec<Chunk>,
    top_k: usize,
    lambda_mult: f32,
) -> Vec<Chunk> {
    if candidates.len() <= top_k {
        return candidates;
    }

    let query_sims: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query_embedding, &c.embedding))
        .collect();

    let mut selected_indices: Vec<usize> = Vec::with_capacity(top_k);

    for _ in 0..top_k.min(candidates.len()) {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            if selected_indices.contains(&i) {
                continue;
            }

            let relevance = query_sims[i];

            let diversity_penalty = selected_indices
                .iter()
                .map(|&s| cosine_similarity(&candidate.embedding, &candidates[s].embedding))
                .fold(0.0f32, f32::max);

            let mmr_score = lambda_mult * relevance - (1.0 - lambda_mult) * diversity_penalty;
            if mmr_score > best_score {
                best_score = mmr_score;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) => selected_indices.push(idx),
            None => break,
        }
    }

    debug!(
        candidates = candidates.len(),
        selected = selected_indices.len(),
        "mmr reranked"
    );

    let mut by_index: std::collections::HashMap<usize, Chunk> =
        candidates.into_iter().enumerate().collect();
    selected_indices
        .into_iter()
        .filter_map(|idx| by_index.remove(&idx))
        .collect()
}
