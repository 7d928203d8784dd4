pub mod memory;
pub mod models;
pub mod time_serde;

mod error;

pub use error::Error;
pub use memory::{InMemoryStore, cosine_similarity};
pub use models::{Category, MemoryRecord, ScoredRecord};

pub type Result<T, E = Error> = std::result::Result<T, E>;
