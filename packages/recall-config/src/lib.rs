mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Gate, Providers, RerankProviderKind, Retrieval,
	RetrievalRerank, Scopes, Service,
};

use std::{fs, path::Path};

const SCOPE_KINDS: [&str; 4] = ["agent", "project", "user", "custom"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.gate.min_chars_cjk == 0 || cfg.gate.min_chars_default == 0 {
		return Err(Error::Validation {
			message: "gate.min_chars_cjk and gate.min_chars_default must be greater than zero."
				.to_string(),
		});
	}

	validate_scopes(cfg)?;
	validate_retrieval(cfg)?;

	Ok(())
}

fn validate_scopes(cfg: &Config) -> Result<()> {
	for (agent_id, scopes) in &cfg.scopes.agent_access {
		if agent_id.trim().is_empty() {
			return Err(Error::Validation {
				message: "scopes.agent_access keys must be non-empty.".to_string(),
			});
		}

		for scope in scopes {
			if !is_valid_scope_id(scope) {
				return Err(Error::Validation {
					message: format!(
						"scopes.agent_access.{agent_id} contains malformed scope {scope:?}."
					),
				});
			}
		}
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("retrieval.vector_weight", retrieval.vector_weight),
		("retrieval.bm25_weight", retrieval.bm25_weight),
		("retrieval.recency_half_life_days", retrieval.recency_half_life_days),
		("retrieval.recency_weight", retrieval.recency_weight),
		("retrieval.time_decay_half_life_days", retrieval.time_decay_half_life_days),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if retrieval.vector_weight + retrieval.bm25_weight <= 0.0 {
		return Err(Error::Validation {
			message: "retrieval.vector_weight and retrieval.bm25_weight must not both be zero."
				.to_string(),
		});
	}

	for (label, value) in [
		("retrieval.min_score", retrieval.min_score),
		("retrieval.hard_min_score", retrieval.hard_min_score),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
	}

	if retrieval.candidate_pool_size == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_pool_size must be greater than zero.".to_string(),
		});
	}
	if retrieval.default_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.default_limit must be greater than zero.".to_string(),
		});
	}

	let rerank = &retrieval.rerank;

	if rerank.enabled {
		if rerank.endpoint.trim().is_empty() {
			return Err(Error::Validation {
				message: "retrieval.rerank.endpoint must be non-empty when enabled.".to_string(),
			});
		}
		if rerank.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "retrieval.rerank.api_key must be non-empty when enabled.".to_string(),
			});
		}
		if rerank.model.trim().is_empty() {
			return Err(Error::Validation {
				message: "retrieval.rerank.model must be non-empty when enabled.".to_string(),
			});
		}
		if rerank.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "retrieval.rerank.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn is_valid_scope_id(scope: &str) -> bool {
	if scope == "global" {
		return true;
	}

	let Some((kind, name)) = scope.split_once(':') else { return false };

	SCOPE_KINDS.contains(&kind) && !name.trim().is_empty() && !name.contains(char::is_whitespace)
}

fn normalize(cfg: &mut Config) {
	let blank_task =
		cfg.providers.embedding.task_query.as_deref().is_some_and(|task| task.trim().is_empty());

	if blank_task {
		cfg.providers.embedding.task_query = None;
	}

	for scopes in cfg.scopes.agent_access.values_mut() {
		for scope in scopes.iter_mut() {
			*scope = scope.trim().to_string();
		}
	}
}
