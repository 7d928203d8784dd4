use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub scopes: Scopes,
	#[serde(default)]
	pub gate: Gate,
	#[serde(default)]
	pub retrieval: Retrieval,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	/// Optional. Sent as `task` with query embeddings, e.g. "retrieval.query".
	#[serde(default)]
	pub task_query: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Scopes {
	/// Map keys are agent ids. An entry replaces the default `global` + `agent:<id>` read set.
	pub agent_access: HashMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Gate {
	pub enabled: bool,
	pub min_chars_cjk: u32,
	pub min_chars_default: u32,
}
impl Default for Gate {
	fn default() -> Self {
		Self { enabled: true, min_chars_cjk: 6, min_chars_default: 15 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub vector_weight: f32,
	pub bm25_weight: f32,
	pub min_score: f32,
	pub candidate_pool_size: u32,
	pub default_limit: u32,
	pub recency_half_life_days: f32,
	pub recency_weight: f32,
	pub filter_noise: bool,
	pub length_norm_anchor: u32,
	pub hard_min_score: f32,
	pub time_decay_half_life_days: f32,
	pub rerank: RetrievalRerank,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			vector_weight: 0.7,
			bm25_weight: 0.3,
			min_score: 0.3,
			candidate_pool_size: 20,
			default_limit: 5,
			recency_half_life_days: 14.0,
			recency_weight: 0.1,
			filter_noise: true,
			length_norm_anchor: 500,
			hard_min_score: 0.35,
			time_decay_half_life_days: 60.0,
			rerank: RetrievalRerank::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalRerank {
	pub enabled: bool,
	pub provider: RerankProviderKind,
	pub endpoint: String,
	pub model: String,
	pub api_key: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}
impl Default for RetrievalRerank {
	fn default() -> Self {
		Self {
			enabled: false,
			provider: RerankProviderKind::Jina,
			endpoint: "https://api.jina.ai/v1/rerank".to_string(),
			model: "jina-reranker-v2-base-multilingual".to_string(),
			api_key: String::new(),
			timeout_ms: 5_000,
			default_headers: Map::new(),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RerankProviderKind {
	#[default]
	Jina,
	SiliconFlow,
	Voyage,
	Pinecone,
}
impl RerankProviderKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Jina => "jina",
			Self::SiliconFlow => "siliconflow",
			Self::Voyage => "voyage",
			Self::Pinecone => "pinecone",
		}
	}
}
