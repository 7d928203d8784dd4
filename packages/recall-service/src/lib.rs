pub mod recall;

mod error;

pub use error::{Error, Result};
pub use recall::{
	Candidate, RecallExplain, RecallItem, RecallRequest, RecallResponse, RerankOutcome,
	RetrievalSource,
};
pub use recall_providers::rerank::RerankScore;

use std::{future::Future, pin::Pin, sync::Arc};

use recall_config::{Config, EmbeddingProviderConfig, RetrievalRerank};
use recall_domain::scope::ScopeSet;
use recall_providers::{embedding, rerank};
use recall_storage::{InMemoryStore, ScoredRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a RetrievalRerank,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>>;
}

/// Read side of the record store. Both methods only return records whose scope is in `scopes`.
pub trait MemoryStore
where
	Self: Send + Sync,
{
	fn vector_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>>;

	fn full_text_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let providers = Arc::new(DefaultProviders);

		Self { embedding: providers.clone(), rerank: providers }
	}
}

/// Stateless over its configuration; share it behind an `Arc` across callers.
pub struct RecallService {
	pub cfg: Config,
	pub store: Arc<dyn MemoryStore>,
	pub providers: Providers,
}
impl RecallService {
	pub fn new(cfg: Config, store: Arc<dyn MemoryStore>, providers: Providers) -> Self {
		Self { cfg, store, providers }
	}
}

/// HTTP-backed providers configured from `[providers.embedding]` and `[retrieval.rerank]`.
pub struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(embedding::embed_query(cfg, text).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a RetrievalRerank,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<RerankScore>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs).await?) })
	}
}

impl MemoryStore for InMemoryStore {
	fn vector_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>> {
		Box::pin(async move {
			Ok(InMemoryStore::vector_search(self, scopes.as_slice(), vector, top_k))
		})
	}

	fn full_text_search<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>> {
		Box::pin(async move {
			Ok(InMemoryStore::full_text_search(self, scopes.as_slice(), query, top_k))
		})
	}
}
