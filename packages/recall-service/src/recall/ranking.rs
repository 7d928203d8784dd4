mod diversity;
mod fusion;
mod rerank;
mod scoring;

pub(super) use diversity::select_diverse;
pub(super) use fusion::{filter_min_score, fuse};
pub(super) use rerank::rerank_candidates;
pub(super) use scoring::score_candidates;

use std::cmp::Ordering;

use crate::Candidate;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Highest score first, then newest record, then id.
fn cmp_by_score(lhs: &Candidate, rhs: &Candidate, score: fn(&Candidate) -> f32) -> Ordering {
	cmp_f32_desc(score(lhs), score(rhs))
		.then_with(|| rhs.record.created_at.cmp(&lhs.record.created_at))
		.then_with(|| lhs.record.id.cmp(&rhs.record.id))
}

/// Maps NaN and infinities to zero.
fn finite_or_zero(value: f32) -> f32 {
	if value.is_finite() { value } else { 0.0 }
}
