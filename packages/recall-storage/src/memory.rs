//! In-process reference store: cosine nearest-neighbour and BM25 keyword search over a record
//! list. Nothing is persisted.

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	fs,
	path::Path,
};

use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, MemoryRecord, Result, ScoredRecord};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Debug, Default)]
pub struct InMemoryStore {
	records: Vec<MemoryRecord>,
	ids: HashSet<String>,
	doc_tokens: Vec<Vec<String>>,
	doc_freq: HashMap<String, usize>,
	total_tokens: usize,
}
impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_records(records: Vec<MemoryRecord>) -> Result<Self> {
		let mut store = Self::new();

		for record in records {
			store.insert(record)?;
		}

		Ok(store)
	}

	/// Reads one JSON record per line. Blank lines are skipped.
	pub fn load_jsonl(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;
		let mut records = Vec::new();

		for (idx, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let record: MemoryRecord = serde_json::from_str(line)
				.map_err(|err| Error::Parse { line: idx + 1, source: err })?;

			records.push(record);
		}

		let store = Self::from_records(records)?;

		tracing::info!(path = %path.display(), records = store.len(), "Loaded memory records.");

		Ok(store)
	}

	pub fn insert(&mut self, record: MemoryRecord) -> Result<()> {
		if record.id.trim().is_empty() {
			return Err(Error::InvalidArgument("Record id must be non-empty.".to_string()));
		}
		if self.ids.contains(&record.id) {
			return Err(Error::Conflict(format!("Record {} already exists.", record.id)));
		}

		let tokens = tokenize(&record.text);
		let mut seen: Vec<&str> = Vec::new();

		for token in &tokens {
			if seen.contains(&token.as_str()) {
				continue;
			}

			seen.push(token.as_str());
			*self.doc_freq.entry(token.clone()).or_insert(0) += 1;
		}

		self.total_tokens += tokens.len();
		self.doc_tokens.push(tokens);
		self.ids.insert(record.id.clone());
		self.records.push(record);

		Ok(())
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn vector_search(
		&self,
		scopes: &[String],
		vector: &[f32],
		top_k: u32,
	) -> Vec<ScoredRecord> {
		let mut hits: Vec<ScoredRecord> = self
			.records
			.iter()
			.filter(|record| scopes.contains(&record.scope))
			.filter_map(|record| {
				let score = cosine_similarity(vector, &record.vector)?;

				Some(ScoredRecord { record: record.clone(), score })
			})
			.collect();

		sort_hits(&mut hits);
		hits.truncate(top_k as usize);

		hits
	}

	/// BM25 scores are divided by the best score among the visible matches, so the top hit scores
	/// 1.0. Records without any query term are not returned.
	pub fn full_text_search(
		&self,
		scopes: &[String],
		query: &str,
		top_k: u32,
	) -> Vec<ScoredRecord> {
		let query_tokens = tokenize(query);

		if query_tokens.is_empty() || self.records.is_empty() {
			return Vec::new();
		}

		let avg_doc_len = self.total_tokens as f32 / self.records.len() as f32;
		let mut hits = Vec::new();
		let mut best = 0.0_f32;

		for (record, tokens) in self.records.iter().zip(self.doc_tokens.iter()) {
			if !scopes.contains(&record.scope) {
				continue;
			}

			let raw = self.bm25(&query_tokens, tokens, avg_doc_len);

			if raw <= 0.0 || !raw.is_finite() {
				continue;
			}

			best = best.max(raw);

			hits.push(ScoredRecord { record: record.clone(), score: raw });
		}

		for hit in &mut hits {
			hit.score /= best;
		}

		sort_hits(&mut hits);
		hits.truncate(top_k as usize);

		hits
	}

	fn bm25(&self, query_tokens: &[String], doc_tokens: &[String], avg_doc_len: f32) -> f32 {
		if doc_tokens.is_empty() || avg_doc_len <= f32::EPSILON {
			return 0.0;
		}

		let mut tf: HashMap<&str, usize> = HashMap::new();

		for token in doc_tokens {
			*tf.entry(token.as_str()).or_insert(0) += 1;
		}

		let total_docs = self.records.len() as f32;
		let doc_len = doc_tokens.len() as f32;
		let mut score = 0.0_f32;

		for token in query_tokens {
			let term_tf = tf.get(token.as_str()).copied().unwrap_or(0) as f32;

			if term_tf <= 0.0 {
				continue;
			}

			let df = self.doc_freq.get(token).copied().unwrap_or(0) as f32;
			let idf = (((total_docs - df + 0.5) / (df + 0.5)) + 1.0).ln();
			let denom = term_tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc_len / avg_doc_len));

			score += idf * ((term_tf * (BM25_K1 + 1.0)) / denom.max(f32::EPSILON));
		}

		score.max(0.0)
	}
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	let similarity = dot / (lhs_norm.sqrt() * rhs_norm.sqrt());

	similarity.is_finite().then(|| similarity.clamp(-1.0, 1.0))
}

fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().map(|word| word.to_lowercase()).collect()
}

fn sort_hits(hits: &mut [ScoredRecord]) {
	hits.sort_by(|left, right| {
		right
			.score
			.partial_cmp(&left.score)
			.unwrap_or(Ordering::Equal)
			.then_with(|| left.record.id.cmp(&right.record.id))
	});
}
