#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read records at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse record on line {line}.")]
	Parse { line: usize, source: serde_json::Error },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
