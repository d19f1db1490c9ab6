use crate::embeddings::cosine_similarity;

/// Default number of results handed to the answer retriever
pub const DEFAULT_K: usize = 8;
/// Default candidate pool for re-ranking
pub const DEFAULT_FETCH_K: usize = 20;
/// Default balance between relevance (1.0) and diversity (0.0)
pub const DEFAULT_LAMBDA: f32 = 0.5;

/// Greedy maximal marginal relevance selection.
///
/// Returns indices into `candidates`, at most `k` of them, in pick order.
/// Each step takes the candidate maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, picked))`;
/// ties go to the lower index.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect();

    let mut picked: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    while picked.len() < k.min(candidates.len()) {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if picked.contains(&i) {
                continue;
            }
            let redundancy = picked
                .iter()
                .map(|&j| cosine_similarity(candidate, candidates[j]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if picked.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance[i] - (1.0 - lambda) * redundancy;
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => picked.push(i),
            None => break,
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pick_is_the_most_relevant() {
        let query = [1.0, 0.0];
        let a = [0.0, 1.0];
        let b = [1.0, 0.0];
        let candidates: [&[f32]; 2] = [&a, &b];
        let picked = maximal_marginal_relevance(&query, &candidates, 1, 0.5);
        assert_eq!(picked, vec![1]);
    }

    #[test]
    fn near_duplicates_are_pushed_down() {
        let query = [1.0, 0.3, 0.0];
        let best = [1.0, 0.02, 0.0];
        let duplicate = [1.0, 0.0, 0.0];
        let different = [0.6, 0.8, 0.0];
        let candidates: [&[f32]; 3] = [&best, &duplicate, &different];

        let diverse = maximal_marginal_relevance(&query, &candidates, 2, 0.5);
        assert_eq!(diverse, vec![0, 2]);

        let relevance_only = maximal_marginal_relevance(&query, &candidates, 2, 1.0);
        assert_eq!(relevance_only, vec![0, 1]);
    }

    #[test]
    fn k_larger_than_pool_returns_everything() {
        let query = [1.0, 0.0];
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let candidates: [&[f32]; 2] = [&a, &b];
        let picked = maximal_marginal_relevance(&query, &candidates, 10, 0.5);
        assert_eq!(picked.len(), 2);
        assert!(maximal_marginal_relevance(&query, &[], 3, 0.5).is_empty());
    }
}
