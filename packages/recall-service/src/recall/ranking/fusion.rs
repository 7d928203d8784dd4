use std::collections::HashMap;

use super::{cmp_by_score, finite_or_zero};
use crate::Candidate;
use recall_config::Retrieval;
use recall_storage::ScoredRecord;

/// Multiplier applied when both retrieval methods found the same record.
pub const HYBRID_AGREEMENT_BONUS: f32 = 1.15;

/// Unions both hit lists by record id and computes the weighted fused score.
pub fn fuse(
	vector_hits: Vec<ScoredRecord>,
	bm25_hits: Vec<ScoredRecord>,
	cfg: &Retrieval,
) -> Vec<Candidate> {
	let mut by_id: HashMap<String, Candidate> = HashMap::new();

	for hit in vector_hits {
		let score = finite_or_zero(hit.score);

		by_id
			.entry(hit.record.id.clone())
			.and_modify(|candidate| {
				candidate.vector_score =
					Some(candidate.vector_score.map_or(score, |v| v.max(score)));
			})
			.or_insert_with(|| new_candidate(hit.record, Some(score), None));
	}
	for hit in bm25_hits {
		let score = finite_or_zero(hit.score).max(0.0);

		by_id
			.entry(hit.record.id.clone())
			.and_modify(|candidate| {
				candidate.bm25_score = Some(candidate.bm25_score.map_or(score, |v| v.max(score)));
			})
			.or_insert_with(|| new_candidate(hit.record, None, Some(score)));
	}

	let mut candidates: Vec<Candidate> = by_id
		.into_values()
		.map(|mut candidate| {
			candidate.fused_score = fused_score(
				candidate.vector_score,
				candidate.bm25_score,
				cfg.vector_weight,
				cfg.bm25_weight,
			);
			candidate.final_score = candidate.fused_score;

			candidate
		})
		.collect();

	candidates.sort_by(|lhs, rhs| cmp_by_score(lhs, rhs, |c| c.fused_score));

	candidates
}

pub fn fused_score(
	vector_score: Option<f32>,
	bm25_score: Option<f32>,
	vector_weight: f32,
	bm25_weight: f32,
) -> f32 {
	let score = match (vector_score, bm25_score) {
		(Some(vector), Some(bm25)) =>
			(vector * vector_weight + bm25 * bm25_weight) * HYBRID_AGREEMENT_BONUS,
		(Some(vector), None) => vector * vector_weight,
		(None, Some(bm25)) => bm25 * bm25_weight,
		(None, None) => 0.0,
	};

	finite_or_zero(score)
}

pub fn filter_min_score(mut candidates: Vec<Candidate>, min_score: f32) -> Vec<Candidate> {
	candidates.retain(|candidate| candidate.fused_score >= min_score);

	candidates
}

fn new_candidate(
	record: recall_storage::MemoryRecord,
	vector_score: Option<f32>,
	bm25_score: Option<f32>,
) -> Candidate {
	Candidate {
		record,
		vector_score,
		bm25_score,
		fused_score: 0.0,
		rerank_score: None,
		final_score: 0.0,
	}
}
