use tracing::warn;

use crate::{Error, MemoryStore, RetrievalSource, Result};
use recall_domain::scope::ScopeSet;
use recall_storage::ScoredRecord;

#[derive(Debug, Default)]
pub(super) struct FetchedCandidates {
	pub(super) vector_hits: Vec<ScoredRecord>,
	pub(super) bm25_hits: Vec<ScoredRecord>,
	pub(super) degraded: Vec<RetrievalSource>,
}

/// Runs both retrieval methods concurrently. Without a query vector only full-text runs. One failed
/// method degrades to the other; both failing is an error.
pub(super) async fn fetch_candidates(
	store: &dyn MemoryStore,
	query: &str,
	query_vector: Option<&[f32]>,
	scopes: &ScopeSet,
	pool_size: u32,
) -> Result<FetchedCandidates> {
	let Some(vector) = query_vector else {
		let bm25_hits = store.full_text_search(scopes, query, pool_size).await?;

		return Ok(FetchedCandidates { bm25_hits, ..Default::default() });
	};
	let (vector_res, bm25_res) = tokio::join!(
		store.vector_search(scopes, vector, pool_size),
		store.full_text_search(scopes, query, pool_size),
	);

	match (vector_res, bm25_res) {
		(Ok(vector_hits), Ok(bm25_hits)) =>
			Ok(FetchedCandidates { vector_hits, bm25_hits, degraded: Vec::new() }),
		(Err(err), Ok(bm25_hits)) => {
			warn!(error = %err, "Vector search failed; using full-text results only.");

			Ok(FetchedCandidates {
				bm25_hits,
				degraded: vec![RetrievalSource::Vector],
				..Default::default()
			})
		},
		(Ok(vector_hits), Err(err)) => {
			warn!(error = %err, "Full-text search failed; using vector results only.");

			Ok(FetchedCandidates {
				vector_hits,
				degraded: vec![RetrievalSource::FullText],
				..Default::default()
			})
		},
		(Err(vector_err), Err(bm25_err)) => Err(Error::Storage {
			message: format!(
				"Vector search failed: {vector_err} Full-text search failed: {bm25_err}"
			),
		}),
	}
}
