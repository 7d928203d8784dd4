use unicode_script::{Script, UnicodeScript};

pub fn is_cjk_char(ch: char) -> bool {
	matches!(ch.script(), Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul)
}

pub fn contains_cjk(input: &str) -> bool {
	input.chars().any(is_cjk_char)
}

/// Accepts BCP 47 style tags such as "zh-CN", "ja", or "ko_KR".
pub fn is_cjk_locale(tag: &str) -> bool {
	let primary = tag.trim().split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();

	matches!(primary.as_str(), "zh" | "ja" | "ko")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_cjk_scripts() {
		assert!(contains_cjk("\u{4F60}\u{597D}"));
		assert!(contains_cjk("\u{3053}\u{3093}\u{306B}\u{3061}\u{306F}"));
		assert!(contains_cjk("\u{C548}\u{B155}"));
		assert!(!contains_cjk("hello, world"));
		assert!(!contains_cjk("caf\u{E9}"));
	}

	#[test]
	fn resolves_locale_tags() {
		assert!(is_cjk_locale("zh-CN"));
		assert!(is_cjk_locale("JA"));
		assert!(is_cjk_locale("ko_KR"));
		assert!(!is_cjk_locale("en-US"));
		assert!(!is_cjk_locale(""));
	}
}
