//! Cross-encoder rerank adapters. Every provider shape is normalized to [`RerankScore`] pairs with
//! relevance in 0.0-1.0.

use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Error, Result};
use recall_config::{RerankProviderKind, RetrievalRerank};

const PINECONE_API_VERSION: &str = "2024-10";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RerankScore {
	pub index: usize,
	pub relevance: f32,
}

pub async fn rerank(
	cfg: &RetrievalRerank,
	query: &str,
	docs: &[String],
) -> Result<Vec<RerankScore>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = build_request_body(cfg.provider, &cfg.model, query, docs);
	let res = client
		.post(cfg.endpoint.as_str())
		.headers(provider_headers(cfg)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(cfg.provider, json, docs.len())
}

pub fn build_request_body(
	provider: RerankProviderKind,
	model: &str,
	query: &str,
	docs: &[String],
) -> Value {
	match provider {
		RerankProviderKind::Jina | RerankProviderKind::SiliconFlow => serde_json::json!({
			"model": model,
			"query": query,
			"documents": docs,
			"top_n": docs.len(),
		}),
		RerankProviderKind::Voyage => serde_json::json!({
			"model": model,
			"query": query,
			"documents": docs,
			"top_k": docs.len(),
		}),
		RerankProviderKind::Pinecone => {
			let documents: Vec<Value> =
				docs.iter().map(|doc| serde_json::json!({ "text": doc })).collect();

			serde_json::json!({
				"model": model,
				"query": query,
				"documents": documents,
				"top_n": docs.len(),
				"return_documents": false,
			})
		},
	}
}

pub fn parse_rerank_response(
	provider: RerankProviderKind,
	json: Value,
	doc_count: usize,
) -> Result<Vec<RerankScore>> {
	let (list_key, score_key) = match provider {
		RerankProviderKind::Jina | RerankProviderKind::SiliconFlow =>
			("results", "relevance_score"),
		RerankProviderKind::Voyage => ("data", "relevance_score"),
		RerankProviderKind::Pinecone => ("data", "score"),
	};
	let results = json.get(list_key).and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse {
			message: format!("Rerank response is missing {list_key} array."),
		}
	})?;
	let mut scores = Vec::with_capacity(results.len());

	for item in results {
		let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;

		if index >= doc_count {
			return Err(Error::InvalidResponse {
				message: format!(
					"Rerank result index {index} is out of range for {doc_count} documents."
				),
			});
		}

		let raw = item.get(score_key).and_then(|v| v.as_f64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing score.".to_string() }
		})? as f32;

		if !raw.is_finite() {
			return Err(Error::InvalidResponse {
				message: "Rerank score must be a finite number.".to_string(),
			});
		}

		scores.push(RerankScore { index, relevance: raw });
	}

	normalize_relevance(&mut scores);

	Ok(scores)
}

/// Decided once per response: when every score is already in 0.0-1.0 they pass through, otherwise
/// all of them are treated as logits and squashed with the logistic function. Order is preserved
/// either way.
pub fn normalize_relevance(scores: &mut [RerankScore]) {
	if scores.iter().all(|score| (0.0..=1.0).contains(&score.relevance)) {
		return;
	}

	for score in scores {
		score.relevance = logistic(score.relevance);
	}
}

fn logistic(raw: f32) -> f32 {
	1.0 / (1.0 + (-raw).exp())
}

fn provider_headers(cfg: &RetrievalRerank) -> Result<HeaderMap> {
	match cfg.provider {
		RerankProviderKind::Pinecone => {
			let mut headers = HeaderMap::new();

			headers.insert("api-key", cfg.api_key.parse()?);
			headers.insert("x-pinecone-api-version", PINECONE_API_VERSION.parse()?);
			crate::extend_headers(&mut headers, &cfg.default_headers)?;

			Ok(headers)
		},
		_ => crate::auth_headers(&cfg.api_key, &cfg.default_headers),
	}
}
