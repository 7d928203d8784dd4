//! Decides from the raw query text alone whether memory retrieval should run.

use std::sync::LazyLock;

use regex::Regex;

use crate::cjk;
use recall_config::Gate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
	/// The query asks for remembered context explicitly.
	Forced,
	Retrieve,
	Skip(SkipReason),
}
impl GateDecision {
	pub fn should_retrieve(self) -> bool {
		matches!(self, Self::Forced | Self::Retrieve)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
	Empty,
	SlashCommand,
	Emoji,
	Confirmation,
	SystemMarker,
	TooShort,
}
impl SkipReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::SlashCommand => "slash_command",
			Self::Emoji => "emoji",
			Self::Confirmation => "confirmation",
			Self::SystemMarker => "system_marker",
			Self::TooShort => "too_short",
		}
	}
}

static MEMORY_INTENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"(?i)\b(?:remember|recall|forgot|forget|memory|memories)\b",
		r"(?i)\b(?:last time|previously|earlier|before|yesterday|ago)\b",
		r"(?i)\b(?:you said|i told you|i mentioned|what did (?:i|we)|did i (?:tell|mention|say))\b",
		r"(?i)\bmy (?:name|email|phone|address|birthday|preference|preferences)\b",
		r"(?:记得|之前|上次|以前|提到过|说过|記得|覚えて|前回|기억)",
	])
});

static CONFIRMATION: LazyLock<Regex> = LazyLock::new(|| {
	compile_one(
		r"(?i)^(?:ok|okay|k|yes|yep|yeah|no|nope|sure|fine|thanks|thank you|thx|ty|got it|understood|cool|nice|great|perfect|awesome|hi|hello|hey|go ahead|continue|next|好的|好|谢谢|謝謝|嗯|行|可以|收到|继续|繼續)[\s.!~。！]*$",
	)
});

static PURE_EMOJI: LazyLock<Regex> = LazyLock::new(|| {
	compile_one(
		r"^[\p{Extended_Pictographic}\p{Regional_Indicator}\p{Emoji_Modifier}\x{FE0F}\x{200D}\s]+$",
	)
});

static SYSTEM_MARKER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"^HEARTBEAT",
		r"^NO_REPLY",
		r"(?i)^\[system\b",
		r"(?i)new session started",
		r"(?i)^(?:ping|pong)[\s.!?]*$",
	])
});

pub fn should_retrieve(query: &str, locale: Option<&str>, cfg: &Gate) -> bool {
	evaluate(query, locale, cfg).should_retrieve()
}

pub fn evaluate(query: &str, locale: Option<&str>, cfg: &Gate) -> GateDecision {
	if !cfg.enabled {
		return GateDecision::Retrieve;
	}

	let trimmed = query.trim();

	if trimmed.is_empty() {
		return GateDecision::Skip(SkipReason::Empty);
	}
	if MEMORY_INTENT.iter().any(|re| re.is_match(trimmed)) {
		return GateDecision::Forced;
	}
	if trimmed.starts_with('/') {
		return GateDecision::Skip(SkipReason::SlashCommand);
	}
	if PURE_EMOJI.is_match(trimmed) {
		return GateDecision::Skip(SkipReason::Emoji);
	}
	if SYSTEM_MARKER.iter().any(|re| re.is_match(trimmed)) {
		return GateDecision::Skip(SkipReason::SystemMarker);
	}
	if CONFIRMATION.is_match(trimmed) {
		return GateDecision::Skip(SkipReason::Confirmation);
	}

	let is_cjk = match locale {
		Some(tag) if !tag.trim().is_empty() => cjk::is_cjk_locale(tag),
		_ => cjk::contains_cjk(trimmed),
	};
	let threshold = if is_cjk { cfg.min_chars_cjk } else { cfg.min_chars_default };

	if (trimmed.chars().count() as u32) < threshold {
		return GateDecision::Skip(SkipReason::TooShort);
	}

	GateDecision::Retrieve
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
	patterns.iter().map(|pattern| compile_one(pattern)).collect()
}

fn compile_one(pattern: &str) -> Regex {
	Regex::new(pattern).unwrap_or_else(|err| panic!("Invalid gate pattern {pattern:?}: {err}."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_greeting_skips() {
		assert!(!should_retrieve("hi", Some("en"), &Gate::default()));
		assert_eq!(
			evaluate("hi", Some("en"), &Gate::default()),
			GateDecision::Skip(SkipReason::Confirmation)
		);
	}

	#[test]
	fn memory_keyword_forces_retrieval() {
		assert_eq!(
			evaluate("please remember I prefer dark mode", None, &Gate::default()),
			GateDecision::Forced
		);
		assert_eq!(evaluate("remember?", None, &Gate::default()), GateDecision::Forced);
		assert_eq!(
			evaluate("\u{4F60}\u{8FD8}\u{8BB0}\u{5F97}\u{5417}", None, &Gate::default()),
			GateDecision::Forced
		);
	}

	#[test]
	fn commands_emoji_and_markers_skip() {
		let cfg = Gate::default();

		assert_eq!(
			evaluate("/status please show everything now", None, &cfg),
			GateDecision::Skip(SkipReason::SlashCommand)
		);
		assert_eq!(
			evaluate("\u{1F44D}\u{1F3FD} \u{1F389}", None, &cfg),
			GateDecision::Skip(SkipReason::Emoji)
		);
		assert_eq!(
			evaluate("HEARTBEAT check from scheduler", None, &cfg),
			GateDecision::Skip(SkipReason::SystemMarker)
		);
		assert_eq!(
			evaluate("thank you!", None, &cfg),
			GateDecision::Skip(SkipReason::Confirmation)
		);
	}

	#[test]
	fn cjk_threshold_is_lower() {
		let cfg = Gate::default();
		let five = "\u{4ECA}\u{5929}\u{5929}\u{6C14}\u{597D}";
		let seven = "\u{4ECA}\u{5929}\u{5929}\u{6C14}\u{5F88}\u{597D}\u{5440}";

		assert_eq!(five.chars().count(), 5);
		assert_eq!(seven.chars().count(), 7);
		assert!(!should_retrieve(five, Some("zh-CN"), &cfg));
		assert!(should_retrieve(seven, Some("zh-CN"), &cfg));
		assert!(!should_retrieve(five, None, &cfg));
		assert!(should_retrieve(seven, None, &cfg));
	}

	#[test]
	fn latin_threshold_applies_at_boundary() {
		let cfg = Gate::default();

		assert_eq!(
			evaluate("deploy the api", None, &cfg),
			GateDecision::Skip(SkipReason::TooShort)
		);
		assert_eq!(evaluate("deploy the apis", None, &cfg), GateDecision::Retrieve);
	}

	#[test]
	fn disabled_gate_always_retrieves() {
		let cfg = Gate { enabled: false, ..Gate::default() };

		assert!(should_retrieve("hi", None, &cfg));
	}
}
