//! Lexical sense disambiguation.
//!
//! A lexical lookup can return several senses for one term. A [`SynsetSelector`] resolves them to
//! exactly one. [`FirstSense`] trusts the lexical database's frequency ordering, while
//! [`ContextAware`] scores every sense against the rest of the query.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, terms};

const DEFINITION_OVERLAP_WEIGHT: f64 = 3.0;
const TECHNICAL_INDICATOR_WEIGHT: f64 = 1.0;
const DOMAIN_HINT_WEIGHT: f64 = 2.0;
const RELATED_OVERLAP_WEIGHT: f64 = 1.5;

/// One sense of a term as reported by the lexical database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SynsetCandidate {
	pub synonyms: Vec<String>,
	pub definition: String,
	#[serde(default)]
	pub broader: Vec<String>,
	#[serde(default)]
	pub narrower: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct SelectionContext<'a> {
	pub query_terms: &'a [String],
	pub domain_hints: &'a [String],
}

pub trait SynsetSelector
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	/// Picks exactly one of `candidates`. An empty slice is [`Error::EmptyCandidates`].
	fn select<'c>(
		&self,
		candidates: &'c [SynsetCandidate],
		context: &SelectionContext<'_>,
	) -> Result<&'c SynsetCandidate>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FirstSense;
impl SynsetSelector for FirstSense {
	fn name(&self) -> &'static str {
		"first_sense"
	}

	fn select<'c>(
		&self,
		candidates: &'c [SynsetCandidate],
		_context: &SelectionContext<'_>,
	) -> Result<&'c SynsetCandidate> {
		candidates.first().ok_or(Error::EmptyCandidates)
	}
}

/// Per-signal breakdown of a [`ContextAware`] score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SenseScore {
	pub definition_overlap: usize,
	pub technical_indicators: usize,
	pub domain_hints: usize,
	pub related_overlap: usize,
}
impl SenseScore {
	pub fn total(&self) -> f64 {
		self.definition_overlap as f64 * DEFINITION_OVERLAP_WEIGHT
			+ self.technical_indicators as f64 * TECHNICAL_INDICATOR_WEIGHT
			+ self.domain_hints as f64 * DOMAIN_HINT_WEIGHT
			+ self.related_overlap as f64 * RELATED_OVERLAP_WEIGHT
	}
}

#[derive(Clone, Debug)]
pub struct ContextAware {
	technical_indicators: Vec<String>,
}
impl ContextAware {
	pub fn new(technical_indicators: Vec<String>) -> Self {
		let mut seen = HashSet::new();
		let technical_indicators = technical_indicators
			.into_iter()
			.filter_map(|indicator| terms::normalize_related_term(&indicator))
			.filter(|indicator| seen.insert(indicator.clone()))
			.collect();

		Self { technical_indicators }
	}

	pub fn score(&self, candidate: &SynsetCandidate, context: &SelectionContext<'_>) -> SenseScore {
		let definition = terms::word_tokens(&candidate.definition);
		let definition_overlap = context
			.query_terms
			.iter()
			.filter(|term| terms::contains_phrase(&definition, term))
			.count();
		let technical_indicators = self
			.technical_indicators
			.iter()
			.filter(|indicator| terms::contains_phrase(&definition, indicator))
			.count();
		let domain_hints = context
			.domain_hints
			.iter()
			.filter(|hint| {
				terms::contains_phrase(&definition, hint)
					|| candidate.synonyms.iter().any(|synonym| {
						terms::contains_phrase(&terms::word_tokens(synonym), hint)
					})
			})
			.count();
		let related: Vec<Vec<String>> = candidate
			.broader
			.iter()
			.chain(candidate.narrower.iter())
			.map(|related| terms::word_tokens(related))
			.collect();
		let related_overlap = context
			.query_terms
			.iter()
			.filter(|term| related.iter().any(|tokens| terms::contains_phrase(tokens, term)))
			.count();

		SenseScore { definition_overlap, technical_indicators, domain_hints, related_overlap }
	}
}
impl Default for ContextAware {
	fn default() -> Self {
		Self::new(sieve_config::default_technical_indicators())
	}
}
impl SynsetSelector for ContextAware {
	fn name(&self) -> &'static str {
		"context_aware"
	}

	fn select<'c>(
		&self,
		candidates: &'c [SynsetCandidate],
		context: &SelectionContext<'_>,
	) -> Result<&'c SynsetCandidate> {
		let mut best: Option<(&SynsetCandidate, f64)> = None;

		for candidate in candidates {
			let score = self.score(candidate, context).total();

			// Strictly greater, so exact ties keep the earlier sense.
			if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
				best = Some((candidate, score));
			}
		}

		best.map(|(candidate, _)| candidate).ok_or(Error::EmptyCandidates)
	}
}

/// Builds the selector named by `expansion.synset_strategy`, defaulting to [`FirstSense`].
pub fn selector_from_config(cfg: &sieve_config::Expansion) -> Box<dyn SynsetSelector> {
	match cfg.synset_strategy.as_str() {
		"context_aware" => Box::new(ContextAware::new(cfg.technical_indicators.clone())),
		_ => Box::new(FirstSense),
	}
}
