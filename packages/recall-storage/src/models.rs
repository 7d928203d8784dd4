use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

const DEFAULT_IMPORTANCE: f32 = 0.7;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	Preference,
	Fact,
	Decision,
	Entity,
	#[default]
	Other,
}
impl Category {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Preference => "preference",
			Self::Fact => "fact",
			Self::Decision => "decision",
			Self::Entity => "entity",
			Self::Other => "other",
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MemoryRecord {
	pub id: String,
	pub text: String,
	#[serde(default)]
	pub vector: Vec<f32>,
	#[serde(default)]
	pub category: Category,
	pub scope: String,
	#[serde(default = "default_importance")]
	pub importance: f32,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(default)]
	pub metadata: Value,
}
impl MemoryRecord {
	/// Importance clamped to 0.0-1.0; non-finite values read as the default.
	pub fn importance(&self) -> f32 {
		if self.importance.is_finite() {
			self.importance.clamp(0.0, 1.0)
		} else {
			DEFAULT_IMPORTANCE
		}
	}
}

/// A record returned by one retrieval method with that method's raw score.
#[derive(Clone, Debug)]
pub struct ScoredRecord {
	pub record: MemoryRecord,
	pub score: f32,
}

fn default_importance() -> f32 {
	DEFAULT_IMPORTANCE
}
