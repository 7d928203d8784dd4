use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use recall_config::EmbeddingProviderConfig;

/// Embeds a retrieval query. `task_query`, when configured, is sent as `task` so providers that
/// distinguish query and passage embeddings produce the query variant.
pub async fn embed_query(cfg: &EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let texts = [text.to_string()];
	let mut vectors = embed(cfg, &texts, cfg.task_query.as_deref()).await?;

	if vectors.len() != 1 {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding provider returned {} vectors for one query.",
				vectors.len()
			),
		});
	}

	Ok(vectors.remove(0))
}

pub async fn embed(
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
	task: Option<&str>,
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = build_embedding_body(cfg, texts, task);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json)
}

fn build_embedding_body(
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
	task: Option<&str>,
) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});

	if let Some(task) = task
		&& let Some(object) = body.as_object_mut()
	{
		object.insert("task".to_string(), Value::String(task.to_string()));
	}

	body
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| Error::InvalidResponse {
		message: "Embedding response is missing data array.".to_string(),
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding =
			item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
				Error::InvalidResponse {
					message: "Embedding item missing embedding array.".to_string(),
				}
			})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
