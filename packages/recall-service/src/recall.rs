mod ranking;
mod retrieval;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{Error, RecallService, Result};
use recall_domain::{
	gate::{self, GateDecision},
	scope::{self, ScopeSet},
};
use recall_storage::{Category, MemoryRecord};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecallRequest {
	pub agent_id: String,
	pub query: String,
	#[serde(default)]
	pub locale: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
	/// Skip the adaptive gate.
	#[serde(default)]
	pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankOutcome {
	Disabled,
	Applied,
	/// The provider failed or timed out; fused scores were kept.
	Fallback,
	/// Nothing to rerank.
	Skipped,
}
impl RerankOutcome {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Disabled => "disabled",
			Self::Applied => "applied",
			Self::Fallback => "fallback",
			Self::Skipped => "skipped",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
	Vector,
	FullText,
}
impl RetrievalSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::FullText => "full_text",
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecallExplain {
	pub vector_score: Option<f32>,
	pub bm25_score: Option<f32>,
	pub fused_score: f32,
	pub rerank_score: Option<f32>,
	pub final_score: f32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecallItem {
	pub id: String,
	pub text: String,
	pub category: Category,
	pub scope: String,
	pub importance: f32,
	#[serde(with = "recall_storage::time_serde")]
	pub created_at: OffsetDateTime,
	pub metadata: serde_json::Value,
	pub final_score: f32,
	pub explain: RecallExplain,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecallResponse {
	pub trace_id: uuid::Uuid,
	/// False when the adaptive gate skipped retrieval.
	pub retrieved: bool,
	pub scopes: Vec<String>,
	/// Retrieval methods that failed and were skipped for this call.
	pub degraded: Vec<RetrievalSource>,
	pub rerank: RerankOutcome,
	pub items: Vec<RecallItem>,
}

/// A record moving through the ranking stages together with its score bag.
#[derive(Debug, Clone)]
pub struct Candidate {
	pub record: MemoryRecord,
	pub vector_score: Option<f32>,
	pub bm25_score: Option<f32>,
	pub fused_score: f32,
	pub rerank_score: Option<f32>,
	pub final_score: f32,
}
impl Candidate {
	fn into_item(self) -> RecallItem {
		let importance = self.record.importance();
		let explain = RecallExplain {
			vector_score: self.vector_score,
			bm25_score: self.bm25_score,
			fused_score: self.fused_score,
			rerank_score: self.rerank_score,
			final_score: self.final_score,
		};
		let MemoryRecord { id, text, category, scope, created_at, metadata, .. } = self.record;

		RecallItem {
			id,
			text,
			category,
			scope,
			importance,
			created_at,
			metadata,
			final_score: self.final_score,
			explain,
		}
	}
}

impl RecallService {
	pub fn should_retrieve(&self, query: &str, locale: Option<&str>) -> bool {
		gate::should_retrieve(query, locale, &self.cfg.gate)
	}

	pub fn resolve_scopes(&self, agent_id: &str) -> ScopeSet {
		scope::resolve_scopes(agent_id, &self.cfg.scopes)
	}

	pub async fn recall(&self, req: RecallRequest) -> Result<RecallResponse> {
		self.recall_at(req, OffsetDateTime::now_utc()).await
	}

	/// Runs one recall with ages measured against `now`.
	pub async fn recall_at(
		&self,
		req: RecallRequest,
		now: OffsetDateTime,
	) -> Result<RecallResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let trace_id = uuid::Uuid::new_v4();
		let query_hash = hash_query(query);
		let decision = if req.force {
			GateDecision::Forced
		} else {
			gate::evaluate(query, req.locale.as_deref(), &self.cfg.gate)
		};
		let scopes = self.resolve_scopes(&req.agent_id);

		if let GateDecision::Skip(reason) = decision {
			debug!(%trace_id, query_hash = %query_hash, reason = reason.as_str(), "Recall gated.");

			return Ok(RecallResponse {
				trace_id,
				retrieved: false,
				scopes: scopes.as_slice().to_vec(),
				degraded: Vec::new(),
				rerank: RerankOutcome::Skipped,
				items: Vec::new(),
			});
		}

		let retrieval_cfg = &self.cfg.retrieval;
		let limit = req.limit.unwrap_or(retrieval_cfg.default_limit).max(1);
		let pool_size = retrieval_cfg.candidate_pool_size.max(limit);
		let query_vector = self.embed_query(query).await.inspect_err(|err| {
			warn!(%trace_id, error = %err, "Query embedding failed; using full-text only.");
		});
		let fetched = match retrieval::fetch_candidates(
			self.store.as_ref(),
			query,
			query_vector.as_ref().ok().map(Vec::as_slice),
			&scopes,
			pool_size,
		)
		.await
		{
			Ok(fetched) => fetched,
			Err(err) => {
				return Err(match query_vector {
					Err(Error::Provider { message }) => Error::Provider {
						message: format!("{message} Full-text search also failed: {err}"),
					},
					_ => err,
				});
			},
		};
		let mut degraded = fetched.degraded;

		if query_vector.is_err() {
			degraded.insert(0, RetrievalSource::Vector);
		}

		let vector_hits = fetched.vector_hits.len();
		let bm25_hits = fetched.bm25_hits.len();
		let fused = ranking::fuse(fetched.vector_hits, fetched.bm25_hits, retrieval_cfg);
		let fused = ranking::filter_min_score(fused, retrieval_cfg.min_score);
		let candidate_count = fused.len();
		let (reranked, rerank) =
			ranking::rerank_candidates(self.providers.rerank.as_ref(), query, fused, retrieval_cfg)
				.await;
		let scored = ranking::score_candidates(reranked, retrieval_cfg, now);
		let selected = ranking::select_diverse(scored, limit as usize);
		let items: Vec<RecallItem> = selected.into_iter().map(Candidate::into_item).collect();

		info!(
			%trace_id,
			query_hash = %query_hash,
			scopes = scopes.as_slice().len(),
			vector_hits,
			bm25_hits,
			candidate_count,
			returned = items.len(),
			rerank = rerank.as_str(),
			degraded = degraded.len(),
			"Recall completed."
		);

		Ok(RecallResponse {
			trace_id,
			retrieved: true,
			scopes: scopes.as_slice().to_vec(),
			degraded,
			rerank,
			items,
		})
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;
		let vector = self.providers.embedding.embed_query(cfg, query).await?;

		if vector.len() != cfg.dimensions as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch: expected {}, got {}.",
					cfg.dimensions,
					vector.len()
				),
			});
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::Provider {
				message: "Embedding contains non-finite values.".to_string(),
			});
		}

		Ok(vector)
	}
}

/// Short stable fingerprint of the query for logs.
fn hash_query(query: &str) -> String {
	let hex = blake3::hash(query.as_bytes()).to_hex();

	hex.as_str()[..16].to_string()
}
