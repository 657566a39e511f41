//! Per-candidate relevance signals and their fusion.
//!
//! Every function here is pure and returns a value in `[0, 1]`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, ExpandedQuery, Result, terms};
use sieve_config::{ProfileWeights, SearchProfiles};

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;
const BM25_AVG_DOC_WORDS: f64 = 100.0;
/// Extra term frequency credited when a term also appears in the title or path.
const BM25_TITLE_BOOST: f64 = 2.0;
/// Weight assumed for a term missing from the weight map.
const BM25_DEFAULT_TERM_WEIGHT: f64 = 0.5;

const TITLE_FILENAME_EXACT: f64 = 1.0;
const TITLE_FILENAME_PARTIAL: f64 = 0.7;
const TITLE_PATH_MATCH: f64 = 0.4;

const PROFILE_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
	/// Full-document summaries.
	Summary,
	/// Passage-level chunks.
	Chunk,
	/// Extracted concept records.
	Concept,
}
impl CollectionKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Summary => "summary",
			Self::Chunk => "chunk",
			Self::Concept => "concept",
		}
	}

	pub fn baseline(self, profiles: &SearchProfiles) -> &ProfileWeights {
		match self {
			Self::Summary => &profiles.summary,
			Self::Chunk => &profiles.chunk,
			Self::Concept => &profiles.concept,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ScoreComponents {
	pub vector: f64,
	pub bm25: f64,
	pub title: f64,
	pub concept: f64,
	pub wordnet: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeightProfile {
	pub vector: f64,
	pub bm25: f64,
	pub title: f64,
	pub concept: f64,
	pub wordnet: f64,
}
impl WeightProfile {
	/// Validates that every weight lies in `[0, 1]` and that the weights sum to 1.0.
	pub fn new(vector: f64, bm25: f64, title: f64, concept: f64, wordnet: f64) -> Result<Self> {
		let profile = Self { vector, bm25, title, concept, wordnet };

		for (label, weight) in profile.entries() {
			if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
				return Err(Error::InvalidProfile {
					message: format!("{label} weight must be in the range 0.0-1.0."),
				});
			}
		}

		if (profile.sum() - 1.0).abs() > PROFILE_SUM_TOLERANCE {
			return Err(Error::InvalidProfile { message: "weights must sum to 1.0.".to_string() });
		}

		Ok(profile)
	}

	pub fn from_config(weights: &ProfileWeights) -> Result<Self> {
		Self::new(weights.vector, weights.bm25, weights.title, weights.concept, weights.wordnet)
	}

	pub fn sum(&self) -> f64 {
		self.vector + self.bm25 + self.title + self.concept + self.wordnet
	}

	pub fn entries(&self) -> [(&'static str, f64); 5] {
		[
			("vector", self.vector),
			("bm25", self.bm25),
			("title", self.title),
			("concept", self.concept),
			("wordnet", self.wordnet),
		]
	}

	/// Re-weights the lexical signal for the shape of `expanded` and spreads the remaining
	/// budget over the other four signals in proportion to their baseline weights.
	pub fn effective(&self, expanded: &ExpandedQuery) -> Self {
		let multiplier =
			wordnet_multiplier(expanded.original_terms().len(), expanded.has_corpus_terms());

		self.with_wordnet_multiplier(multiplier)
	}

	pub fn with_wordnet_multiplier(&self, multiplier: f64) -> Self {
		let others = self.vector + self.bm25 + self.title + self.concept;

		// Nothing to rebalance against.
		if others <= 0.0 {
			return *self;
		}

		let wordnet = (self.wordnet * multiplier).clamp(0.0, 1.0);
		let scale = (1.0 - wordnet) / others;

		Self {
			vector: self.vector * scale,
			bm25: self.bm25 * scale,
			title: self.title * scale,
			concept: self.concept * scale,
			wordnet,
		}
	}
}
impl TryFrom<&ProfileWeights> for WeightProfile {
	type Error = Error;

	fn try_from(weights: &ProfileWeights) -> Result<Self> {
		Self::from_config(weights)
	}
}

/// Lexical-signal multiplier for a query with `original_term_count` terms.
///
/// Single-term queries lean on synonyms, more so when the corpus knows nothing related to the
/// term. Multi-term queries with corpus matches lean on them less.
pub fn wordnet_multiplier(original_term_count: usize, has_corpus_match: bool) -> f64 {
	match (original_term_count, has_corpus_match) {
		(1, false) => 2.0,
		(1, true) => 1.5,
		(count, true) if count > 1 => 0.75,
		_ => 1.0,
	}
}

/// `1 - distance` clamped to `[0, 1]`. A missing distance counts as a perfect match.
pub fn vector_score(distance: Option<f64>) -> f64 {
	let distance = distance.unwrap_or(0.0);

	if distance.is_nan() {
		return 0.0;
	}

	(1.0 - distance).clamp(0.0, 1.0)
}

/// Weighted, saturating term-frequency score over body text and title/path.
///
/// A body word counts toward a term when it contains the term, or when the term is a phrase and
/// the word is one of its tokens. A title/path hit adds a
/// fixed frequency bonus. Each term's saturated frequency is normalized to `[0, 1)` and averaged
/// with the term weights.
pub fn bm25_score(
	terms: &[String],
	weights: &HashMap<String, f64>,
	text: &str,
	title_path: &str,
) -> f64 {
	if terms.is_empty() {
		return 0.0;
	}

	let words = terms::word_tokens(text);
	let title = title_path.to_lowercase();
	let length_norm = 1.0 - BM25_B + BM25_B * (words.len() as f64 / BM25_AVG_DOC_WORDS);
	let mut weighted = 0.0;
	let mut total_weight = 0.0;

	for term in terms {
		let term = term.to_lowercase();
		let weight = weights.get(&term).copied().unwrap_or(BM25_DEFAULT_TERM_WEIGHT);

		total_weight += weight;

		if term.is_empty() {
			continue;
		}

		let mut phrase_tokens = terms::word_tokens(&term);

		if phrase_tokens.len() > 1 {
			phrase_tokens.retain(|token| token.chars().count() >= terms::MIN_TERM_CHARS);
		} else {
			phrase_tokens.clear();
		}

		let mut frequency = words
			.iter()
			.filter(|word| {
				word.contains(term.as_str())
					|| phrase_tokens.iter().any(|token| token == *word)
			})
			.count() as f64;

		if title.contains(term.as_str()) {
			frequency += BM25_TITLE_BOOST;
		}
		if frequency == 0.0 {
			continue;
		}

		let saturated = frequency * (BM25_K1 + 1.0) / (frequency + BM25_K1 * length_norm);

		weighted += weight * saturated / (BM25_K1 + 1.0);
	}

	if total_weight <= 0.0 {
		return 0.0;
	}

	(weighted / total_weight).clamp(0.0, 1.0)
}

/// Fraction of `terms` found in `title_path`, crediting a filename hit above a hit elsewhere in
/// the path. All terms matching filename tokens exactly scores 1.0.
pub fn title_score(terms: &[String], title_path: &str) -> f64 {
	let path = title_path.trim();

	if terms.is_empty() || path.is_empty() {
		return 0.0;
	}

	let path = path.to_lowercase().replace('\\', "/");
	let path = path.trim_end_matches('/');
	let (directory, filename) = path.rsplit_once('/').unwrap_or(("", path));
	let stem = match filename.rsplit_once('.') {
		Some((stem, _)) if !stem.is_empty() => stem,
		_ => filename,
	};
	let stem_tokens = terms::word_tokens(stem);
	let mut total = 0.0;

	for term in terms {
		let term = term.to_lowercase();

		if term.is_empty() {
			continue;
		}

		total += if terms::contains_phrase(&stem_tokens, &term) {
			TITLE_FILENAME_EXACT
		} else if stem.contains(term.as_str()) {
			TITLE_FILENAME_PARTIAL
		} else if directory.contains(term.as_str()) {
			TITLE_PATH_MATCH
		} else {
			0.0
		};
	}

	(total / terms.len() as f64).clamp(0.0, 1.0)
}

/// Weighted share of original query terms that fuzzily match one of the candidate's concepts.
pub fn concept_score(expanded: &ExpandedQuery, concept_names: &[String]) -> f64 {
	let originals = expanded.original_terms();

	if concept_names.is_empty() || originals.is_empty() {
		return 0.0;
	}

	let concepts: Vec<String> = concept_names.iter().map(|name| name.trim().to_lowercase()).collect();
	let mut total = 0.0;

	for term in originals {
		if concepts.iter().any(|concept| terms::fuzzy_match(concept, term)) {
			total += expanded.weight(term);
		}
	}

	(total / originals.len() as f64).clamp(0.0, 1.0)
}

/// Fraction of lexical expansion terms found in `text`.
pub fn wordnet_score(lexical_terms: &[String], text: &str) -> f64 {
	if lexical_terms.is_empty() || text.is_empty() {
		return 0.0;
	}

	let text = text.to_lowercase();
	let matched = lexical_terms
		.iter()
		.filter(|term| {
			let term = term.to_lowercase();

			!term.is_empty() && text.contains(term.as_str())
		})
		.count();

	(matched as f64 / lexical_terms.len() as f64).clamp(0.0, 1.0)
}

/// Weighted sum of the five signals.
pub fn hybrid_score(components: &ScoreComponents, weights: &WeightProfile) -> f64 {
	let score = weights.vector * components.vector
		+ weights.bm25 * components.bm25
		+ weights.title * components.title
		+ weights.concept * components.concept
		+ weights.wordnet * components.wordnet;

	if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Candidate concept names, in candidate order and original casing, that fuzzily match any
/// positively weighted expansion term. Deduplicated case-insensitively, at most `max` entries.
pub fn matched_concepts(
	expanded: &ExpandedQuery,
	concept_names: &[String],
	max: usize,
) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for name in concept_names {
		if out.len() >= max {
			break;
		}

		let key = name.trim().to_lowercase();

		if key.is_empty() || seen.contains(&key) {
			continue;
		}

		let matched = expanded
			.all_terms()
			.iter()
			.any(|term| expanded.weight(term) > 0.0 && terms::fuzzy_match(&key, term));

		if matched {
			seen.insert(key);
			out.push(name.trim().to_string());
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ExpansionWeights;

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	fn catalog() -> WeightProfile {
		WeightProfile::new(0.30, 0.25, 0.20, 0.15, 0.10).expect("Catalog profile must be valid.")
	}

	#[test]
	fn vector_score_clamps_one_minus_distance() {
		assert_eq!(vector_score(Some(0.0)), 1.0);
		assert_eq!(vector_score(Some(0.5)), 0.5);
		assert_eq!(vector_score(Some(1.0)), 0.0);
		assert_eq!(vector_score(Some(2.0)), 0.0);
		assert_eq!(vector_score(Some(-0.5)), 1.0);
		assert_eq!(vector_score(None), 1.0);
	}

	#[test]
	fn hybrid_score_of_perfect_components_is_one() {
		let components =
			ScoreComponents { vector: 1.0, bm25: 1.0, title: 1.0, concept: 1.0, wordnet: 1.0 };

		assert!((hybrid_score(&components, &catalog()) - 1.0).abs() < 1e-9);
	}

	#[test]
	fn hybrid_score_is_weighted_sum() {
		let components =
			ScoreComponents { vector: 0.8, bm25: 0.6, title: 0.5, concept: 0.4, wordnet: 0.2 };

		assert!((hybrid_score(&components, &catalog()) - 0.57).abs() < 1e-9);
	}

	#[test]
	fn profile_must_sum_to_one() {
		assert!(WeightProfile::new(0.3, 0.3, 0.3, 0.3, 0.3).is_err());
		assert!(WeightProfile::new(1.2, -0.2, 0.0, 0.0, 0.0).is_err());
	}

	#[test]
	fn wordnet_multiplier_follows_query_shape() {
		assert_eq!(wordnet_multiplier(1, false), 2.0);
		assert_eq!(wordnet_multiplier(1, true), 1.5);
		assert_eq!(wordnet_multiplier(3, true), 0.75);
		assert_eq!(wordnet_multiplier(3, false), 1.0);
		assert_eq!(wordnet_multiplier(0, true), 1.0);
	}

	#[test]
	fn single_term_query_doubles_wordnet_weight() {
		let expanded = ExpandedQuery::unexpanded(strings(&["typescript"]));
		let effective = catalog().effective(&expanded);

		assert!((effective.wordnet - 0.20).abs() < 1e-9);
		assert!((effective.sum() - 1.0).abs() < 1e-9);
		assert!((effective.vector - 0.30 * 0.8 / 0.9).abs() < 1e-9);
	}

	#[test]
	fn multi_term_query_with_corpus_match_lowers_wordnet_weight() {
		let expanded = ExpandedQuery::compose(
			strings(&["clean", "architecture"]),
			strings(&["software architecture"]),
			Vec::new(),
			ExpansionWeights::default(),
		);
		let effective = catalog().effective(&expanded);
		let others = effective.vector + effective.bm25 + effective.title + effective.concept;

		assert!((effective.wordnet - 0.075).abs() < 1e-9);
		assert!((others - 0.925).abs() < 1e-9);
	}

	#[test]
	fn profile_without_other_signals_is_left_alone() {
		let profile = WeightProfile::new(0.0, 0.0, 0.0, 0.0, 1.0).expect("Profile must be valid.");

		assert_eq!(profile.with_wordnet_multiplier(0.75), profile);
	}

	#[test]
	fn title_score_prefers_filename_matches() {
		assert_eq!(title_score(&strings(&["typescript"]), "/docs/typescript.pdf"), 1.0);
		assert_eq!(title_score(&[], "/docs/typescript.pdf"), 0.0);
		assert_eq!(title_score(&strings(&["typescript"]), ""), 0.0);

		let filename = title_score(&strings(&["script"]), "/docs/typescript.pdf");
		let directory = title_score(&strings(&["docs"]), "/docs/typescript.pdf");

		assert!(filename > directory);
		assert!(directory > 0.0);
	}

	#[test]
	fn title_score_ignores_the_file_extension() {
		assert_eq!(title_score(&strings(&["pdf"]), "/docs/typescript.pdf"), 0.0);
		assert!(title_score(&strings(&["script"]), "/docs/typescript.pdf") > 0.0);
	}

	#[test]
	fn title_score_is_normalized_by_term_count() {
		let score = title_score(&strings(&["typescript", "handbook"]), "/docs/typescript.pdf");

		assert!((score - 0.5).abs() < 1e-12);
	}

	#[test]
	fn bm25_is_zero_without_terms_or_matches() {
		let weights = HashMap::new();

		assert_eq!(bm25_score(&[], &weights, "some text", "/a.pdf"), 0.0);
		assert_eq!(bm25_score(&strings(&["rust"]), &weights, "some text", "/a.pdf"), 0.0);
	}

	#[test]
	fn bm25_rewards_weight_and_title_hits() {
		let expanded = ExpandedQuery::compose(
			strings(&["ownership"]),
			Vec::new(),
			strings(&["possession"]),
			ExpansionWeights::default(),
		);
		let terms = expanded.all_terms().to_vec();
		let body_only =
			bm25_score(&terms, expanded.weights(), "ownership rules in practice", "/a.pdf");
		let with_title =
			bm25_score(&terms, expanded.weights(), "ownership rules in practice", "/ownership.pdf");
		let synonym_only =
			bm25_score(&terms, expanded.weights(), "possession rules in practice", "/a.pdf");

		assert!(body_only > 0.0 && body_only <= 1.0);
		assert!(with_title > body_only);
		assert!(body_only > synonym_only);
	}

	#[test]
	fn bm25_counts_words_that_contain_the_term() {
		let weights = HashMap::from([("test".to_string(), 1.0)]);

		assert!(bm25_score(&strings(&["test"]), &weights, "testing", "") > 0.0);
		assert_eq!(bm25_score(&strings(&["testing"]), &weights, "a test", ""), 0.0);
	}

	#[test]
	fn bm25_ignores_short_words_inside_longer_terms() {
		let theory = HashMap::from([("theory".to_string(), 1.0)]);
		let information = HashMap::from([("information".to_string(), 1.0)]);

		assert_eq!(
			bm25_score(&strings(&["theory"]), &theory, "the cat sat on the mat", "/pets.md"),
			0.0
		);
		assert_eq!(
			bm25_score(&strings(&["information"]), &information, "recipes for bread", "/food.md"),
			0.0
		);
	}

	#[test]
	fn bm25_counts_phrase_tokens() {
		let weights = HashMap::from([("borrow checker".to_string(), 1.0)]);
		let terms = strings(&["borrow checker"]);

		assert!(bm25_score(&terms, &weights, "the checker rejects this", "") > 0.0);
		assert_eq!(bm25_score(&terms, &weights, "the check fails", ""), 0.0);

		let weights = HashMap::from([("state of the art".to_string(), 1.0)]);

		assert_eq!(
			bm25_score(&strings(&["state of the art"]), &weights, "one of a kind", ""),
			0.0
		);
	}

	#[test]
	fn concept_score_matches_original_terms_fuzzily() {
		let expanded = ExpandedQuery::unexpanded(strings(&["architecture", "testing"]));
		let concepts = strings(&["Software Architecture", "Design Patterns"]);

		assert!((concept_score(&expanded, &concepts) - 0.5).abs() < 1e-12);
		assert_eq!(concept_score(&expanded, &[]), 0.0);
	}

	#[test]
	fn wordnet_score_is_match_fraction() {
		let terms = strings(&["blueprint", "plan", "sketch", "draft"]);

		assert!((wordnet_score(&terms, "A Blueprint and a plan.") - 0.5).abs() < 1e-12);
		assert_eq!(wordnet_score(&[], "text"), 0.0);
		assert_eq!(wordnet_score(&terms, ""), 0.0);
	}

	#[test]
	fn matched_concepts_keep_candidate_casing_and_cap() {
		let expanded = ExpandedQuery::compose(
			strings(&["design"]),
			strings(&["architecture"]),
			Vec::new(),
			ExpansionWeights::default(),
		);
		let concepts = strings(&[
			"Domain-Driven Design",
			"domain-driven design",
			"Software Architecture",
			"Testing",
			"Design Patterns",
			"Design Systems",
			"Interaction Design",
			"Design Thinking",
		]);
		let matched = matched_concepts(&expanded, &concepts, 5);

		assert_eq!(
			matched,
			strings(&[
				"Domain-Driven Design",
				"Software Architecture",
				"Design Patterns",
				"Design Systems",
				"Interaction Design",
			])
		);
	}
}
