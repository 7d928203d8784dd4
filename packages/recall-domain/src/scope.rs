use serde::Serialize;

use recall_config::Scopes;

pub const GLOBAL_SCOPE: &str = "global";

/// Scopes a caller may read. Never empty; falls back to `global`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet {
	scopes: Vec<String>,
}
impl ScopeSet {
	pub fn new<I, S>(scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut out: Vec<String> = Vec::new();

		for scope in scopes {
			let scope = scope.as_ref().trim();

			if scope.is_empty() || out.iter().any(|existing| existing == scope) {
				continue;
			}

			out.push(scope.to_string());
		}

		if out.is_empty() {
			out.push(GLOBAL_SCOPE.to_string());
		}

		Self { scopes: out }
	}

	pub fn global() -> Self {
		Self { scopes: vec![GLOBAL_SCOPE.to_string()] }
	}

	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.iter().any(|existing| existing == scope)
	}

	pub fn as_slice(&self) -> &[String] {
		&self.scopes
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(String::as_str)
	}
}

pub fn agent_scope(agent_id: &str) -> String {
	format!("agent:{agent_id}")
}

pub fn resolve_scopes(agent_id: &str, cfg: &Scopes) -> ScopeSet {
	let agent_id = agent_id.trim();

	if agent_id.is_empty() {
		return ScopeSet::global();
	}
	if let Some(scopes) = cfg.agent_access.get(agent_id) {
		return ScopeSet::new(scopes);
	}

	ScopeSet::new([GLOBAL_SCOPE.to_string(), agent_scope(agent_id)])
}
