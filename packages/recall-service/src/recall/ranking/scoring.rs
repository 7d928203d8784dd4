use time::OffsetDateTime;

use super::{cmp_by_score, finite_or_zero};
use crate::Candidate;
use recall_config::Retrieval;
use recall_domain::noise;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MIN_LENGTH_FACTOR: f32 = 0.5;
const MAX_LENGTH_FACTOR: f32 = 2.0;

/// Applies recency, importance, length and age decay in that order, then drops candidates under
/// the hard minimum and, when enabled, noise. Output is sorted by `final_score`.
pub fn score_candidates(
	candidates: Vec<Candidate>,
	cfg: &Retrieval,
	now: OffsetDateTime,
) -> Vec<Candidate> {
	let mut scored: Vec<Candidate> = candidates
		.into_iter()
		.map(|mut candidate| {
			candidate.final_score = final_score(&candidate, cfg, now);

			candidate
		})
		.filter(|candidate| candidate.final_score >= cfg.hard_min_score)
		.filter(|candidate| !cfg.filter_noise || !noise::is_noise(&candidate.record.text))
		.collect();

	scored.sort_by(|lhs, rhs| cmp_by_score(lhs, rhs, |c| c.final_score));

	scored
}

fn final_score(candidate: &Candidate, cfg: &Retrieval, now: OffsetDateTime) -> f32 {
	let age = age_days(candidate.record.created_at, now);
	let chars = candidate.record.text.chars().count();
	let mut score = finite_or_zero(candidate.fused_score);

	score = finite_or_zero(
		score + recency_boost(age, cfg.recency_half_life_days, cfg.recency_weight),
	);
	score = finite_or_zero(score * importance_factor(candidate.record.importance()));
	score = finite_or_zero(score * length_factor(chars, cfg.length_norm_anchor));

	finite_or_zero(score * time_decay_factor(age, cfg.time_decay_half_life_days))
}

/// Whole and fractional days since `created_at`; future timestamps count as age zero.
pub fn age_days(created_at: OffsetDateTime, now: OffsetDateTime) -> f32 {
	let seconds = (now - created_at).as_seconds_f64();

	if seconds.is_finite() && seconds > 0.0 { (seconds / SECONDS_PER_DAY) as f32 } else { 0.0 }
}

pub fn recency_boost(age_days: f32, half_life_days: f32, weight: f32) -> f32 {
	if half_life_days <= 0.0 || weight == 0.0 {
		return 0.0;
	}

	finite_or_zero((-age_days / half_life_days).exp() * weight)
}

pub fn importance_factor(importance: f32) -> f32 {
	0.7 + 0.3 * importance.clamp(0.0, 1.0)
}

/// Shrinks long texts and boosts short ones around `anchor` characters. Below the point where the
/// curve's denominator reaches zero the factor stays at its upper bound, so it never increases
/// with length.
pub fn length_factor(chars: usize, anchor: u32) -> f32 {
	if anchor == 0 {
		return 1.0;
	}

	let ratio = chars.max(1) as f32 / anchor as f32;
	let denominator = 1.0 + 0.5 * ratio.log2();

	if !denominator.is_finite() || denominator <= 0.0 {
		return MAX_LENGTH_FACTOR;
	}

	(1.0 / denominator).clamp(MIN_LENGTH_FACTOR, MAX_LENGTH_FACTOR)
}

pub fn time_decay_factor(age_days: f32, half_life_days: f32) -> f32 {
	if half_life_days <= 0.0 {
		return 1.0;
	}

	0.5 + 0.5 * (-age_days / half_life_days).exp()
}
