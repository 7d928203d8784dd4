use std::cmp::Ordering;

use super::cmp_f32_desc;
use crate::Candidate;
use recall_storage::cosine_similarity;

/// Similarity above which a candidate counts as a near-duplicate of a selected one.
pub const SIMILARITY_THRESHOLD: f32 = 0.85;
pub const DEMOTION_FACTOR: f32 = 0.5;

const MAX_DEMOTIONS_PER_CANDIDATE: usize = 32;

struct PoolEntry {
	idx: usize,
	selection_score: f32,
}

/// Greedy selection of at most `limit` candidates that demotes near-duplicates instead of dropping
/// them. Only the internal selection score is demoted; `final_score` is returned unchanged.
pub fn select_diverse(candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
	if candidates.is_empty() || limit == 0 {
		return Vec::new();
	}

	let mut pool: Vec<PoolEntry> = candidates
		.iter()
		.enumerate()
		.map(|(idx, candidate)| PoolEntry { idx, selection_score: candidate.final_score })
		.collect();
	let mut selected: Vec<usize> = Vec::with_capacity(limit.min(candidates.len()));
	let max_iterations = candidates.len().saturating_mul(MAX_DEMOTIONS_PER_CANDIDATE + 1);
	let mut iterations = 0;

	pool.sort_by(cmp_entries);

	while selected.len() < limit && !pool.is_empty() && iterations < max_iterations {
		iterations += 1;

		if !is_near_duplicate(&candidates, &selected, pool[0].idx) {
			selected.push(pool.remove(0).idx);

			continue;
		}

		let has_dissimilar =
			pool[1..].iter().any(|entry| !is_near_duplicate(&candidates, &selected, entry.idx));

		if !has_dissimilar {
			// Only near-duplicates remain; take the best to fill the quota.
			selected.push(pool.remove(0).idx);

			continue;
		}

		let mut entry = pool.remove(0);

		entry.selection_score *= DEMOTION_FACTOR;

		let pos = pool
			.binary_search_by(|other| cmp_entries(other, &entry).then(Ordering::Less))
			.unwrap_or_else(|pos| pos);

		pool.insert(pos, entry);
	}

	// Iteration cap reached: fill the rest preferring candidates that are still dissimilar.
	while selected.len() < limit && !pool.is_empty() {
		let pos = pool
			.iter()
			.position(|entry| !is_near_duplicate(&candidates, &selected, entry.idx))
			.unwrap_or(0);

		selected.push(pool.remove(pos).idx);
	}

	let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();

	selected.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

fn cmp_entries(lhs: &PoolEntry, rhs: &PoolEntry) -> Ordering {
	cmp_f32_desc(lhs.selection_score, rhs.selection_score).then_with(|| lhs.idx.cmp(&rhs.idx))
}

/// Missing or mismatched embeddings count as dissimilar.
fn is_near_duplicate(candidates: &[Candidate], selected: &[usize], idx: usize) -> bool {
	let vector = &candidates[idx].record.vector;

	selected.iter().any(|selected_idx| {
		cosine_similarity(vector, &candidates[*selected_idx].record.vector)
			.is_some_and(|similarity| similarity > SIMILARITY_THRESHOLD)
	})
}
