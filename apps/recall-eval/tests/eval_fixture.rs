use std::{
	fs,
	future::IntoFuture,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
};

use axum::{Json, Router, routing};
use serde_json::Value;
use tokio::{
	net::TcpListener,
	sync::oneshot::{self, Sender},
};

use recall_eval::Args;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn start_server(app: Router) -> (String, Sender<()>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind stub server.");
	let addr = listener.local_addr().expect("Failed to read stub server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

/// Deployment questions embed along the second axis, everything else along the first.
async fn embed_handler(Json(payload): Json<Value>) -> Json<Value> {
	let text = payload["input"][0].as_str().unwrap_or_default();
	let embedding = if text.contains("deploy") { [0.0, 1.0, 0.0] } else { [1.0, 0.0, 0.0] };

	Json(serde_json::json!({ "data": [{ "index": 0, "embedding": embedding }] }))
}

fn fixture(name: &str) -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn write_config(api_base: &str) -> PathBuf {
	let template = fs::read_to_string(fixture("recall.toml")).expect("Failed to read config.");
	let contents = template
		.replace("api_base    = \"https://api.jina.ai\"", &format!("api_base = \"{api_base}\""));
	let path = std::env::temp_dir().join(format!(
		"recall_eval_{}_{}.toml",
		std::process::id(),
		TEMP_COUNTER.fetch_add(1, Ordering::SeqCst)
	));

	fs::write(&path, contents).expect("Failed to write config.");

	path
}

fn args(config: PathBuf) -> Args {
	Args {
		config,
		records: fixture("records.jsonl"),
		query: None,
		dataset: Some(fixture("dataset.json")),
		agent_id: "main".to_string(),
		locale: None,
		limit: None,
		force: false,
	}
}

#[tokio::test]
async fn dataset_run_scores_fixture_queries() {
	let app = Router::new().route("/v1/embeddings", routing::post(embed_handler));
	let (base, shutdown) = start_server(app).await;
	let config_path = write_config(&base);
	let config = recall_config::load(&config_path).expect("Fixture config should load.");
	let output = recall_eval::evaluate(config, &args(config_path.clone()))
		.await
		.expect("Evaluation should succeed.");
	let queries = output["queries"].as_array().expect("Queries should be an array.");

	assert_eq!(output["dataset"]["record_count"], 5);
	assert_eq!(queries.len(), 3);
	assert_eq!(queries[0]["retrieved_ids"][0], "r1");
	assert_eq!(queries[0]["rr"], 1.0);
	assert_eq!(queries[1]["retrieved_ids"][0], "r2");
	assert_eq!(queries[2]["retrieved"], false);
	assert_eq!(output["summary"]["gated_count"], 1);

	for query in queries {
		let ids = query["retrieved_ids"].as_array().expect("Ids should be an array.");

		// The refusal record is noise and the ops record is outside the main agent's scopes.
		assert!(!ids.iter().any(|id| id == "r4" || id == "r5"));
	}

	let _ = fs::remove_file(config_path);
	let _ = shutdown.send(());
}

#[tokio::test]
async fn single_query_returns_the_recall_response() {
	let app = Router::new().route("/v1/embeddings", routing::post(embed_handler));
	let (base, shutdown) = start_server(app).await;
	let config_path = write_config(&base);
	let config = recall_config::load(&config_path).expect("Fixture config should load.");
	let mut args = args(config_path.clone());

	args.dataset = None;
	args.query = Some("when are production deploys frozen".to_string());

	let output = recall_eval::evaluate(config, &args).await.expect("Recall should succeed.");

	assert_eq!(output["retrieved"], true);
	assert_eq!(output["items"][0]["id"], "r2");
	assert_eq!(output["items"][0]["category"], "decision");
	assert_eq!(output["rerank"], "disabled");

	let _ = fs::remove_file(config_path);
	let _ = shutdown.send(());
}
