//! Fixtures and scripted collaborators for exercising `recall-service` without a network or store.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use recall_config::{
	Config, EmbeddingProviderConfig, Gate, Providers, Retrieval, RetrievalRerank, Scopes, Service,
};
use recall_domain::scope::ScopeSet;
use recall_service::{
	BoxFuture, EmbeddingProvider, Error, MemoryStore, RerankProvider, RerankScore, Result,
};
use recall_storage::{Category, MemoryRecord, ScoredRecord};

pub const TEST_DIMENSIONS: u32 = 3;

/// Default configuration with a three-dimensional embedding provider that is never contacted.
pub fn test_config() -> Config {
	Config {
		service: Service::default(),
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "stub-embedding".to_string(),
				dimensions: TEST_DIMENSIONS,
				timeout_ms: 1_000,
				task_query: None,
				default_headers: Map::new(),
			},
		},
		scopes: Scopes::default(),
		gate: Gate::default(),
		retrieval: Retrieval::default(),
	}
}

/// Same as [`test_config`] with reranking switched on and a short timeout.
pub fn rerank_config(timeout_ms: u64) -> Config {
	let mut cfg = test_config();

	cfg.retrieval.rerank = RetrievalRerank {
		enabled: true,
		api_key: "test-key".to_string(),
		timeout_ms,
		..RetrievalRerank::default()
	};

	cfg
}

pub fn record(id: &str, text: &str) -> RecordBuilder {
	RecordBuilder {
		record: MemoryRecord {
			id: id.to_string(),
			text: text.to_string(),
			vector: Vec::new(),
			category: Category::Fact,
			scope: "global".to_string(),
			importance: 0.7,
			created_at: OffsetDateTime::UNIX_EPOCH,
			metadata: Value::Null,
		},
	}
}

#[derive(Clone)]
pub struct RecordBuilder {
	record: MemoryRecord,
}
impl RecordBuilder {
	pub fn scope(mut self, scope: &str) -> Self {
		self.record.scope = scope.to_string();

		self
	}

	pub fn vector(mut self, vector: Vec<f32>) -> Self {
		self.record.vector = vector;

		self
	}

	pub fn importance(mut self, importance: f32) -> Self {
		self.record.importance = importance;

		self
	}

	pub fn category(mut self, category: Category) -> Self {
		self.record.category = category;

		self
	}

	pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
		self.record.created_at = created_at;

		self
	}

	pub fn metadata(mut self, metadata: Value) -> Self {
		self.record.metadata = metadata;

		self
	}

	pub fn build(self) -> MemoryRecord {
		self.record
	}

	pub fn scored(self, score: f32) -> ScoredRecord {
		ScoredRecord { record: self.record, score }
	}
}

/// Returns a scripted vector per query, or a fallback vector for any other query.
pub struct StubEmbedding {
	by_query: HashMap<String, Vec<f32>>,
	fallback: Option<Vec<f32>>,
	calls: AtomicUsize,
}
impl StubEmbedding {
	pub fn fixed(vector: Vec<f32>) -> Self {
		Self { by_query: HashMap::new(), fallback: Some(vector), calls: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self { by_query: HashMap::new(), fallback: None, calls: AtomicUsize::new(0) }
	}

	pub fn with_query(mut self, query: &str, vector: Vec<f32>) -> Self {
		self.by_query.insert(query.to_string(), vector);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for StubEmbedding {
	fn embed_query<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.by_query.get(text).or(self.fallback.as_ref()).cloned().ok_or_else(|| {
				Error::Provider { message: "Stub embedding provider is unavailable.".to_string() }
			})
		})
	}
}

#[derive(Clone, Debug)]
pub enum RerankBehavior {
	Scores(Vec<RerankScore>),
	Fail,
	/// Never resolves; only a timeout ends the call.
	Hang,
}

pub struct StubRerank {
	behavior: RerankBehavior,
	calls: AtomicUsize,
	last_docs: Mutex<Vec<String>>,
}
impl StubRerank {
	pub fn new(behavior: RerankBehavior) -> Self {
		Self { behavior, calls: AtomicUsize::new(0), last_docs: Mutex::new(Vec::new()) }
	}

	pub fn scores(scores: Vec<RerankScore>) -> Self {
		Self::new(RerankBehavior::Scores(scores))
	}

	pub fn failing() -> Self {
		Self::new(RerankBehavior::Fail)
	}

	pub fn hanging() -> Self {
		Self::new(RerankBehavior::Hang)
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn last_docs(&self) -> Vec<String> {
		self.last_docs.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl RerankProvider for StubRerank {
	fn rerank<'a>(
		&'a self,
		_: &'a RetrievalRerank,
		_: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		*self.last_docs.lock().unwrap_or_else(|err| err.into_inner()) = docs.to_vec();

		Box::pin(async move {
			match &self.behavior {
				RerankBehavior::Scores(scores) => Ok(scores.clone()),
				RerankBehavior::Fail =>
					Err(Error::Provider { message: "Stub rerank provider failed.".to_string() }),
				RerankBehavior::Hang => std::future::pending().await,
			}
		})
	}
}

/// Store that serves fixed hit lists, filtered by scope and truncated to `top_k`. Either method can
/// be scripted to fail.
#[derive(Default)]
pub struct ScriptedStore {
	vector_hits: Vec<ScoredRecord>,
	text_hits: Vec<ScoredRecord>,
	vector_fails: bool,
	text_fails: bool,
	vector_calls: AtomicUsize,
	text_calls: AtomicUsize,
}
impl ScriptedStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_vector_hits(mut self, hits: Vec<ScoredRecord>) -> Self {
		self.vector_hits = hits;

		self
	}

	pub fn with_text_hits(mut self, hits: Vec<ScoredRecord>) -> Self {
		self.text_hits = hits;

		self
	}

	pub fn failing_vector(mut self) -> Self {
		self.vector_fails = true;

		self
	}

	pub fn failing_text(mut self) -> Self {
		self.text_fails = true;

		self
	}

	pub fn vector_calls(&self) -> usize {
		self.vector_calls.load(Ordering::SeqCst)
	}

	pub fn text_calls(&self) -> usize {
		self.text_calls.load(Ordering::SeqCst)
	}
}
impl MemoryStore for ScriptedStore {
	fn vector_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		_: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>> {
		self.vector_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			serve(&self.vector_hits, self.vector_fails, scopes, top_k, "vector")
		})
	}

	fn full_text_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		_: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>> {
		self.text_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { serve(&self.text_hits, self.text_fails, scopes, top_k, "full-text") })
	}
}

fn serve(
	hits: &[ScoredRecord],
	fails: bool,
	scopes: &ScopeSet,
	top_k: u32,
	label: &str,
) -> Result<Vec<ScoredRecord>> {
	if fails {
		return Err(Error::Storage { message: format!("Scripted {label} search failure.") });
	}

	Ok(hits
		.iter()
		.filter(|hit| scopes.contains(&hit.record.scope))
		.take(top_k as usize)
		.cloned()
		.collect())
}
