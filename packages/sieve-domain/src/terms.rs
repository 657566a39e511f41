use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

/// Query terms shorter than this many characters are dropped.
pub const MIN_TERM_CHARS: usize = 3;

/// Splits raw query text into lowercase alphanumeric terms, dropping short tokens and keeping
/// the first occurrence of each term in input order.
pub fn normalize_terms(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in word_tokens(text) {
		if token.chars().count() < MIN_TERM_CHARS {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

/// Lowercase alphanumeric runs of `text`, in order, duplicates included.
pub fn word_tokens(text: &str) -> Vec<String> {
	let normalized: String = text.nfkc().collect();
	let mut out = Vec::new();
	let mut current = String::new();

	for ch in normalized.chars() {
		if ch.is_alphanumeric() {
			current.extend(ch.to_lowercase());
		} else if !current.is_empty() {
			out.push(std::mem::take(&mut current));
		}
	}

	if !current.is_empty() {
		out.push(current);
	}

	out
}

/// Lowercases and trims a collaborator-supplied term, folding lexical-database underscores
/// into spaces. Returns `None` when nothing is left.
pub fn normalize_related_term(raw: &str) -> Option<String> {
	let folded: String = raw.nfkc().collect::<String>().replace('_', " ");
	let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

	if collapsed.is_empty() { None } else { Some(collapsed) }
}

/// Case-insensitive substring match in either direction. Both inputs must already be lowercase.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
	if a.is_empty() || b.is_empty() {
		return false;
	}

	a.contains(b) || b.contains(a)
}

/// Whether `tokens` contains the token sequence of `phrase`.
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
	let needle = word_tokens(phrase);

	if needle.is_empty() || needle.len() > tokens.len() {
		return false;
	}

	tokens.windows(needle.len()).any(|window| window == needle.as_slice())
}
