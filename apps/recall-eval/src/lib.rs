use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use recall_config::Config;
use recall_service::{Providers, RecallRequest, RecallService};
use recall_storage::InMemoryStore;

#[derive(Debug, Parser)]
#[command(
	version = recall_cli::VERSION,
	rename_all = "kebab",
	styles = recall_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSONL file with one memory record per line.
	#[arg(long, short = 'r', value_name = "FILE")]
	pub records: PathBuf,
	/// Runs a single recall and prints the full response.
	#[arg(long, short = 'q', value_name = "TEXT", required_unless_present = "dataset")]
	pub query: Option<String>,
	/// Scores every query in a JSON dataset against its expected record ids.
	#[arg(long, short = 'd', value_name = "FILE", conflicts_with = "query")]
	pub dataset: Option<PathBuf>,
	#[arg(long, value_name = "ID", default_value = "main")]
	pub agent_id: String,
	#[arg(long, value_name = "TAG")]
	pub locale: Option<String>,
	#[arg(long, value_name = "N")]
	pub limit: Option<u32>,
	/// Bypass the adaptive gate.
	#[arg(long)]
	pub force: bool,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	#[serde(default)]
	defaults: EvalDefaults,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct EvalDefaults {
	agent_id: Option<String>,
	locale: Option<String>,
	limit: Option<u32>,
	force: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	agent_id: Option<String>,
	locale: Option<String>,
	limit: Option<u32>,
	force: Option<bool>,
	expected_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	config_path: String,
	records_path: String,
	record_count: usize,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
	gated_count: usize,
	degraded_count: usize,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	trace_id: Uuid,
	retrieved: bool,
	rerank: String,
	degraded: Vec<String>,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	expected_ids: Vec<String>,
	retrieved_ids: Vec<String>,
}

struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = recall_config::load(&args.config)?;

	init_tracing(&config);

	let output = evaluate(config, &args).await?;

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

/// Runs the single query or the dataset named by `args` and returns the JSON report.
pub async fn evaluate(config: Config, args: &Args) -> color_eyre::Result<serde_json::Value> {
	let store = InMemoryStore::load_jsonl(&args.records)?;
	let record_count = store.len();
	let service = RecallService::new(config, Arc::new(store), Providers::default());

	if let Some(dataset_path) = &args.dataset {
		let dataset = load_dataset(dataset_path)?;
		let output = eval_dataset(&service, &dataset, args, record_count).await?;

		return Ok(serde_json::to_value(output)?);
	}

	let query =
		args.query.clone().ok_or_else(|| eyre::eyre!("--query or --dataset is required."))?;
	let response = service
		.recall(RecallRequest {
			agent_id: args.agent_id.clone(),
			query,
			locale: args.locale.clone(),
			limit: args.limit,
			force: args.force,
		})
		.await?;

	Ok(serde_json::to_value(response)?)
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval_dataset(
	service: &RecallService,
	dataset: &EvalDataset,
	args: &Args,
	record_count: usize,
) -> color_eyre::Result<EvalOutput> {
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let request = RecallRequest {
			agent_id: query
				.agent_id
				.clone()
				.or_else(|| dataset.defaults.agent_id.clone())
				.unwrap_or_else(|| args.agent_id.clone()),
			query: query.query.clone(),
			locale: query
				.locale
				.clone()
				.or_else(|| dataset.defaults.locale.clone())
				.or_else(|| args.locale.clone()),
			limit: query.limit.or(dataset.defaults.limit).or(args.limit),
			force: query.force.or(dataset.defaults.force).unwrap_or(args.force),
		};
		let started = Instant::now();
		let response = service.recall(request).await?;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let retrieved = unique_ids(response.items.iter().map(|item| item.id.as_str()));
		let expected: HashSet<&str> = query.expected_ids.iter().map(String::as_str).collect();
		let metrics = compute_metrics(&retrieved, &expected);

		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", index + 1)),
			query: query.query.clone(),
			trace_id: response.trace_id,
			retrieved: response.retrieved,
			rerank: response.rerank.as_str().to_string(),
			degraded: response.degraded.iter().map(|source| source.as_str().to_string()).collect(),
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			ndcg: metrics.ndcg,
			latency_ms,
			expected_ids: query.expected_ids.clone(),
			retrieved_ids: retrieved,
		});
		latencies_ms.push(latency_ms);
	}

	let summary = summarize(&reports, &latencies_ms);

	info!(
		queries = reports.len(),
		mean_rr = summary.mean_rr,
		mean_ndcg = summary.mean_ndcg,
		"Evaluation finished."
	);

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			config_path: args.config.display().to_string(),
			records_path: args.records.display().to_string(),
			record_count,
			query_count: reports.len(),
		},
		summary,
		queries: reports,
	})
}

fn unique_ids<'a, I>(iter: I) -> Vec<String>
where
	I: Iterator<Item = &'a str>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for id in iter {
		if seen.insert(id) {
			out.push(id.to_string());
		}
	}

	out
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if !expected.contains(id.as_str()) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();
		first_hit.get_or_insert(rank);
	}

	let idcg: f64 = (1..=expected.len().min(retrieved.len()))
		.map(|rank| 1.0 / (rank as f64 + 1.0).log2())
		.sum();
	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected.is_empty() { 0.0 } else { relevant_count as f64 / expected.len() as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.total_cmp(b));

	EvalSummary {
		avg_recall_at_k: reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count,
		avg_precision_at_k: reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count,
		mean_rr: reports.iter().map(|r| r.rr).sum::<f64>() / count,
		mean_ndcg: reports.iter().map(|r| r.ndcg).sum::<f64>() / count,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
		gated_count: reports.iter().filter(|r| !r.retrieved).count(),
		degraded_count: reports.iter().filter(|r| !r.degraded.is_empty()).count(),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let pos = percentile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
