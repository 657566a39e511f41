use std::collections::{HashMap, HashSet};

use serde::Serialize;

pub const ORIGINAL_TERM_WEIGHT: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpansionWeights {
	pub corpus: f64,
	pub lexical: f64,
}
impl Default for ExpansionWeights {
	fn default() -> Self {
		Self { corpus: 0.8, lexical: 0.6 }
	}
}
impl From<&sieve_config::Expansion> for ExpansionWeights {
	fn from(cfg: &sieve_config::Expansion) -> Self {
		Self { corpus: cfg.corpus_weight, lexical: cfg.lexical_weight }
	}
}

/// Result of expanding one query. Built once per search through [`ExpandedQuery::compose`] and
/// read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpandedQuery {
	original_terms: Vec<String>,
	corpus_terms: Vec<String>,
	wordnet_terms: Vec<String>,
	all_terms: Vec<String>,
	weights: HashMap<String, f64>,
}
impl ExpandedQuery {
	/// Composes the three term lists.
	///
	/// Corpus and lexical lists are deduplicated and stripped of original terms; they may still
	/// overlap each other. `all_terms` keeps the order original, corpus, lexical. The first weight
	/// assigned to a term wins, so original terms always keep a weight of exactly 1.0.
	pub fn compose(
		original_terms: Vec<String>,
		corpus_terms: Vec<String>,
		wordnet_terms: Vec<String>,
		weights: ExpansionWeights,
	) -> Self {
		let original_terms = dedupe(original_terms, &HashSet::new());
		let originals: HashSet<String> = original_terms.iter().cloned().collect();
		let corpus_terms = dedupe(corpus_terms, &originals);
		let wordnet_terms = dedupe(wordnet_terms, &originals);
		let mut all_terms = Vec::new();
		let mut seen = HashSet::new();
		let mut term_weights = HashMap::new();

		for (terms, weight) in [
			(&original_terms, ORIGINAL_TERM_WEIGHT),
			(&corpus_terms, weights.corpus),
			(&wordnet_terms, weights.lexical),
		] {
			let weight = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 0.0 };

			for term in terms {
				if seen.insert(term.clone()) {
					all_terms.push(term.clone());
				}

				term_weights.entry(term.clone()).or_insert(weight);
			}
		}

		Self { original_terms, corpus_terms, wordnet_terms, all_terms, weights: term_weights }
	}

	/// An expansion carrying only the normalized original terms.
	pub fn unexpanded(original_terms: Vec<String>) -> Self {
		Self::compose(original_terms, Vec::new(), Vec::new(), ExpansionWeights::default())
	}

	pub fn original_terms(&self) -> &[String] {
		&self.original_terms
	}

	pub fn corpus_terms(&self) -> &[String] {
		&self.corpus_terms
	}

	pub fn wordnet_terms(&self) -> &[String] {
		&self.wordnet_terms
	}

	pub fn all_terms(&self) -> &[String] {
		&self.all_terms
	}

	pub fn weights(&self) -> &HashMap<String, f64> {
		&self.weights
	}

	/// Weight of `term`, or 0.0 when the term is not part of the expansion.
	pub fn weight(&self, term: &str) -> f64 {
		self.weights.get(term).copied().unwrap_or(0.0)
	}

	pub fn has_corpus_terms(&self) -> bool {
		!self.corpus_terms.is_empty()
	}

	pub fn is_empty(&self) -> bool {
		self.all_terms.is_empty()
	}
}

fn dedupe(terms: Vec<String>, exclude: &HashSet<String>) -> Vec<String> {
	let mut out = Vec::with_capacity(terms.len());
	let mut seen = HashSet::new();

	for term in terms {
		let term = term.trim().to_lowercase();

		if term.is_empty() || exclude.contains(&term) {
			continue;
		}
		if seen.insert(term.clone()) {
			out.push(term);
		}
	}

	out
}
