//! Low-value text classification shared by capture admission and retrieval filtering.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const MIN_MEANINGFUL_CHARS: usize = 5;
const NOISE_PREFIXES: [&str; 3] = ["NO_REPLY", "\u{2705} New session started", "HEARTBEAT"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
	Empty,
	TooShort,
	Refusal,
	MetaQuestion,
	Greeting,
	Boilerplate,
	CodeOnly,
}

static REFUSAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"(?i)\bi (?:don't|do not) have (?:any )?(?:information|memories|memory|records?|details|context)\b",
		r"(?i)\bi (?:don't|do not|can't|cannot|couldn't) (?:recall|remember)\b",
		r"(?i)\bi (?:wasn't|was not|couldn't|could not) (?:able to )?find\b",
		r"(?i)\bno (?:relevant )?memor(?:y|ies) (?:found|available|stored)\b",
		r"(?i)^(?:i'm|i am) (?:sorry|afraid),? (?:but )?i (?:can't|cannot|don't|do not)\b",
		r"(?i)^as an ai(?: language model| assistant)?,? i (?:can't|cannot|don't|do not)\b",
	])
});

static META_QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"(?i)^(?:do|did|can|could) you (?:still )?(?:remember|recall)\b",
		r"(?i)\bwhat (?:do|did) you (?:remember|know) about me\b",
		r"(?i)\b(?:did|have) i (?:ever )?(?:tell|told|mention|mentioned) you\b",
		r"(?i)^what did i (?:tell|say|mention)\b",
		r"(?i)^(?:show|list|check) (?:me )?(?:your|my) memor(?:y|ies)\b",
	])
});

static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"(?i)^(?:hi|hello|hey|hiya|yo|howdy|greetings|good (?:morning|afternoon|evening|night))(?: there)?[\s!.,~]*$",
		r"(?i)^(?:thanks|thank you|thx|ok|okay|bye|goodbye|see you)[\s!.,~]*$",
	])
});

static BOILERPLATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	compile(&[
		r"(?i)^(?:fresh|new) session\b",
		r"(?i)^session (?:started|reset|resumed)\b",
		r"(?i)^\[system\]",
		r"(?i)^/(?:new|reset|clear)\b",
		r"^HEARTBEAT_OK$",
	])
});

static INJECTED_MEMORIES: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)<relevant-memories>.*?</relevant-memories>")
		.unwrap_or_else(|err| panic!("Invalid injected memories pattern: {err}."))
});

static EMBEDDED_JSON: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)```json.*?```")
		.unwrap_or_else(|err| panic!("Invalid embedded JSON pattern: {err}."))
});

static EXTRA_NEWLINES: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\n{3,}").unwrap_or_else(|err| panic!("Invalid newline pattern: {err}."))
});

pub fn is_noise(text: &str) -> bool {
	classify(text).is_some()
}

pub fn classify(text: &str) -> Option<NoiseKind> {
	let cleaned = clean_text(text);
	let trimmed = cleaned.trim();

	if trimmed.is_empty() {
		return Some(NoiseKind::Empty);
	}
	if NOISE_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix)) {
		return Some(NoiseKind::Boilerplate);
	}
	if trimmed.chars().count() < MIN_MEANINGFUL_CHARS {
		return Some(NoiseKind::TooShort);
	}
	if is_code_only(trimmed) {
		return Some(NoiseKind::CodeOnly);
	}
	if matches_any(&BOILERPLATE_PATTERNS, trimmed) {
		return Some(NoiseKind::Boilerplate);
	}
	if matches_any(&GREETING_PATTERNS, trimmed) {
		return Some(NoiseKind::Greeting);
	}
	if matches_any(&REFUSAL_PATTERNS, trimmed) {
		return Some(NoiseKind::Refusal);
	}
	if matches_any(&META_QUESTION_PATTERNS, trimmed) {
		return Some(NoiseKind::MetaQuestion);
	}

	None
}

/// Strips injected memory blocks and fenced `json` metadata, then collapses blank runs. Output is
/// NFKC normalized.
pub fn clean_text(text: &str) -> String {
	let normalized: String = text.nfkc().collect();
	let stripped = INJECTED_MEMORIES.replace_all(&normalized, "");
	let stripped = EMBEDDED_JSON.replace_all(&stripped, "");
	let collapsed = EXTRA_NEWLINES.replace_all(&stripped, "\n\n");

	collapsed.trim().to_string()
}

fn is_code_only(text: &str) -> bool {
	text.len() >= 6 && text.starts_with("```") && text.ends_with("```")
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
	patterns.iter().any(|re| re.is_match(text))
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
	patterns
		.iter()
		.map(|pattern| {
			Regex::new(pattern)
				.unwrap_or_else(|err| panic!("Invalid noise pattern {pattern:?}: {err}."))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_refusals() {
		assert_eq!(
			classify("I don't have any information about your travel plans."),
			Some(NoiseKind::Refusal)
		);
		assert_eq!(classify("Sorry, I can't recall that conversation."), Some(NoiseKind::Refusal));
		assert_eq!(classify("No relevant memories found."), Some(NoiseKind::Refusal));
		assert_eq!(
			classify("As an AI language model, I don't have personal preferences."),
			Some(NoiseKind::Refusal)
		);
	}

	#[test]
	fn classifies_meta_questions() {
		assert_eq!(classify("Do you remember what I said?"), Some(NoiseKind::MetaQuestion));
		assert_eq!(classify("what do you know about me"), Some(NoiseKind::MetaQuestion));
		assert_eq!(classify("Did I tell you about the trip?"), Some(NoiseKind::MetaQuestion));
	}

	#[test]
	fn classifies_greetings_and_boilerplate() {
		assert_eq!(classify("Hello there!"), Some(NoiseKind::Greeting));
		assert_eq!(classify("good morning"), Some(NoiseKind::Greeting));
		assert_eq!(classify("NO_REPLY"), Some(NoiseKind::Boilerplate));
		assert_eq!(
			classify("\u{2705} New session started \u{00B7} model: x"),
			Some(NoiseKind::Boilerplate)
		);
		assert_eq!(classify("HEARTBEAT_OK"), Some(NoiseKind::Boilerplate));
		assert_eq!(classify("[System] compacted context"), Some(NoiseKind::Boilerplate));
	}

	#[test]
	fn short_empty_and_code_only_text_is_noise() {
		assert_eq!(classify("   "), Some(NoiseKind::Empty));
		assert_eq!(classify("ok"), Some(NoiseKind::TooShort));
		assert_eq!(classify("```\nls -la\n```"), Some(NoiseKind::CodeOnly));
	}

	#[test]
	fn injected_memory_block_alone_is_noise() {
		let text = "<relevant-memories>\n- user likes tea\n</relevant-memories>";

		assert_eq!(classify(text), Some(NoiseKind::Empty));
		assert!(!is_noise(
			"<relevant-memories>- x</relevant-memories>User prefers dark mode in every editor."
		));
	}

	#[test]
	fn substantive_statements_are_not_noise() {
		assert!(!is_noise("User prefers dark mode in every editor."));
		assert!(!is_noise("Decided to deploy the API on Fridays only after review."));
		assert!(!is_noise("Hello world is the first program Alice wrote in Rust."));
		assert!(!is_noise("Alice works as an AI researcher at Acme Labs."));
		assert!(!is_noise("Bob described his role as an AI safety lead on the platform team."));
		assert!(!is_noise("\u{7528}\u{6237}\u{559C}\u{6B22}\u{559D}\u{9F99}\u{4E95}\u{8336}"));
	}

	#[test]
	fn clean_text_collapses_blank_runs() {
		assert_eq!(clean_text("a\n\n\n\nb"), "a\n\nb");
	}

	#[test]
	fn embedded_json_metadata_is_stripped() {
		let text = "User moved to Berlin in May.\n```json\n{\"source\": \"chat\"}\n```";

		assert_eq!(clean_text(text), "User moved to Berlin in May.");
		assert_eq!(classify("```json\n{\"ok\": true}\n```"), Some(NoiseKind::Empty));
		assert!(!is_noise(text));
	}
}
