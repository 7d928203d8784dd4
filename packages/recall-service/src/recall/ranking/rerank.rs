use std::time::Duration;

use tracing::warn;

use super::cmp_by_score;
use crate::{Candidate, RerankOutcome, RerankProvider, RerankScore};
use recall_config::Retrieval;

pub const RERANK_WEIGHT: f32 = 0.6;
pub const FUSED_WEIGHT: f32 = 0.4;

/// Sends the top of the pool to the cross-encoder and blends its relevance into the fused score.
/// Never fails: any provider problem leaves the fused scores untouched.
pub async fn rerank_candidates(
	provider: &dyn RerankProvider,
	query: &str,
	mut candidates: Vec<Candidate>,
	cfg: &Retrieval,
) -> (Vec<Candidate>, RerankOutcome) {
	if !cfg.rerank.enabled {
		return (candidates, RerankOutcome::Disabled);
	}
	if candidates.is_empty() {
		return (candidates, RerankOutcome::Skipped);
	}

	let pool = (cfg.candidate_pool_size as usize).min(candidates.len());
	let docs: Vec<String> =
		candidates[..pool].iter().map(|candidate| candidate.record.text.clone()).collect();
	let timeout = Duration::from_millis(cfg.rerank.timeout_ms);
	let scores = match tokio::time::timeout(timeout, provider.rerank(&cfg.rerank, query, &docs))
		.await
	{
		Ok(Ok(scores)) => scores,
		Ok(Err(err)) => {
			warn!(
				error = %err,
				provider = cfg.rerank.provider.as_str(),
				"Rerank failed; keeping fused scores."
			);

			return (candidates, RerankOutcome::Fallback);
		},
		Err(_) => {
			warn!(
				timeout_ms = cfg.rerank.timeout_ms,
				provider = cfg.rerank.provider.as_str(),
				"Rerank timed out; keeping fused scores."
			);

			return (candidates, RerankOutcome::Fallback);
		},
	};

	if let Err(message) = validate_scores(&scores, pool) {
		warn!(
			error = %message,
			provider = cfg.rerank.provider.as_str(),
			"Rerank response rejected; keeping fused scores."
		);

		return (candidates, RerankOutcome::Fallback);
	}

	blend_scores(&mut candidates[..pool], &scores);
	candidates.sort_by(|lhs, rhs| cmp_by_score(lhs, rhs, |c| c.fused_score));

	(candidates, RerankOutcome::Applied)
}

fn validate_scores(scores: &[RerankScore], pool: usize) -> Result<(), String> {
	for score in scores {
		if score.index >= pool {
			return Err(format!(
				"Rerank index {} is out of range for {pool} documents.",
				score.index
			));
		}
		if !score.relevance.is_finite() {
			return Err(format!("Rerank score for index {} is not finite.", score.index));
		}
	}

	Ok(())
}

/// Indices the provider omitted keep their fused score.
fn blend_scores(pool: &mut [Candidate], scores: &[RerankScore]) {
	for score in scores {
		let candidate = &mut pool[score.index];
		let relevance = score.relevance.clamp(0.0, 1.0);

		candidate.rerank_score = Some(relevance);
		candidate.fused_score = RERANK_WEIGHT * relevance + FUSED_WEIGHT * candidate.fused_score;
		candidate.final_score = candidate.fused_score;
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::{BoxFuture, Error, Result, recall::ranking::test_support::candidate};
	use recall_config::RetrievalRerank;

	enum Behavior {
		Scores(Vec<RerankScore>),
		Fail,
		Hang,
	}

	struct ScriptedRerank {
		behavior: Behavior,
		calls: AtomicUsize,
		docs_sent: AtomicUsize,
	}
	impl ScriptedRerank {
		fn new(behavior: Behavior) -> Self {
			Self { behavior, calls: AtomicUsize::new(0), docs_sent: AtomicUsize::new(0) }
		}
	}
	impl RerankProvider for ScriptedRerank {
		fn rerank<'a>(
			&'a self,
			_: &'a RetrievalRerank,
			_: &'a str,
			docs: &'a [String],
		) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.docs_sent.store(docs.len(), Ordering::SeqCst);

			Box::pin(async move {
				match &self.behavior {
					Behavior::Scores(scores) => Ok(scores.clone()),
					Behavior::Fail => Err(Error::Provider { message: "boom".to_string() }),
					Behavior::Hang => std::future::pending().await,
				}
			})
		}
	}

	fn enabled_cfg() -> Retrieval {
		let mut cfg = Retrieval::default();

		cfg.rerank.enabled = true;
		cfg.rerank.timeout_ms = 50;

		cfg
	}

	fn pool() -> Vec<Candidate> {
		vec![
			candidate("a", "alpha", 0.8),
			candidate("b", "beta", 0.6),
			candidate("c", "gamma", 0.4),
		]
	}

	#[tokio::test]
	async fn disabled_rerank_is_a_pass_through() {
		let provider = ScriptedRerank::new(Behavior::Fail);
		let (out, outcome) =
			rerank_candidates(&provider, "q", pool(), &Retrieval::default()).await;

		assert_eq!(outcome, RerankOutcome::Disabled);
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
		assert_eq!(out[0].fused_score, 0.8);
	}

	#[tokio::test]
	async fn blends_and_reorders() {
		let provider = ScriptedRerank::new(Behavior::Scores(vec![
			RerankScore { index: 0, relevance: 0.1 },
			RerankScore { index: 2, relevance: 1.0 },
		]));
		let (out, outcome) = rerank_candidates(&provider, "q", pool(), &enabled_cfg()).await;

		assert_eq!(outcome, RerankOutcome::Applied);
		// c: 0.6 * 1.0 + 0.4 * 0.4 = 0.76, b omitted keeps 0.6, a: 0.06 + 0.32 = 0.38.
		assert_eq!(out.iter().map(|c| c.record.id.as_str()).collect::<Vec<_>>(), ["c", "b", "a"]);
		assert!((out[0].fused_score - 0.76).abs() < 1e-6);
		assert_eq!(out[1].rerank_score, None);
		assert_eq!(out[1].fused_score, 0.6);
	}

	#[tokio::test]
	async fn only_the_pool_is_sent() {
		let mut cfg = enabled_cfg();

		cfg.candidate_pool_size = 2;

		let provider =
			ScriptedRerank::new(Behavior::Scores(vec![RerankScore { index: 2, relevance: 1.0 }]));
		let (out, outcome) = rerank_candidates(&provider, "q", pool(), &cfg).await;

		// Index 2 is outside a pool of two documents.
		assert_eq!(outcome, RerankOutcome::Fallback);
		assert_eq!(out[2].fused_score, 0.4);
	}

	#[tokio::test]
	async fn candidates_past_the_pool_merge_back_by_score() {
		let mut cfg = enabled_cfg();

		cfg.candidate_pool_size = 2;

		let provider = ScriptedRerank::new(Behavior::Scores(vec![
			RerankScore { index: 0, relevance: 0.0 },
			RerankScore { index: 1, relevance: 0.2 },
		]));
		let (out, outcome) = rerank_candidates(&provider, "q", pool(), &cfg).await;

		assert_eq!(outcome, RerankOutcome::Applied);
		assert_eq!(provider.docs_sent.load(Ordering::SeqCst), 2);
		// a: 0.4 * 0.8 = 0.32, b: 0.6 * 0.2 + 0.4 * 0.6 = 0.36, c is outside the pool.
		assert_eq!(out.iter().map(|c| c.record.id.as_str()).collect::<Vec<_>>(), ["c", "b", "a"]);
		assert_eq!(out[0].fused_score, 0.4);
		assert_eq!(out[0].rerank_score, None);
		assert!((out[1].fused_score - 0.36).abs() < 1e-6);
		assert!((out[2].fused_score - 0.32).abs() < 1e-6);
	}

	#[tokio::test]
	async fn provider_failure_falls_back() {
		let provider = ScriptedRerank::new(Behavior::Fail);
		let (out, outcome) = rerank_candidates(&provider, "q", pool(), &enabled_cfg()).await;

		assert_eq!(outcome, RerankOutcome::Fallback);
		assert!(out.iter().all(|c| c.rerank_score.is_none()));
	}

	#[tokio::test]
	async fn timeout_falls_back() {
		let provider = ScriptedRerank::new(Behavior::Hang);
		let (out, outcome) = rerank_candidates(&provider, "q", pool(), &enabled_cfg()).await;

		assert_eq!(outcome, RerankOutcome::Fallback);
		assert_eq!(out[0].record.id, "a");
		assert_eq!(out[0].fused_score, 0.8);
	}

	#[tokio::test]
	async fn empty_pool_skips_the_request() {
		let provider = ScriptedRerank::new(Behavior::Fail);
		let (_, outcome) = rerank_candidates(&provider, "q", Vec::new(), &enabled_cfg()).await;

		assert_eq!(outcome, RerankOutcome::Skipped);
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
	}
}
