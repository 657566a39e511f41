use std::{collections::HashSet, sync::Arc};

use futures::future;

use sieve_domain::{
	ExpandedQuery, ExpansionWeights, SelectionContext, SynsetCandidate, SynsetSelector, synset,
	terms,
};

use crate::{ConceptLookup, LexicalLookup, PrewarmReport, Result};

/// Builds an [`ExpandedQuery`] from raw query text using the corpus concept graph and a lexical
/// database. Lookups for different terms run concurrently; a failed lookup only drops that term's
/// contribution.
pub struct QueryExpander {
	concepts: Arc<dyn ConceptLookup>,
	lexicon: Arc<dyn LexicalLookup>,
	selector: Box<dyn SynsetSelector>,
	weights: ExpansionWeights,
	domain_hints: Vec<String>,
	max_corpus_terms: usize,
	max_lexical_terms: usize,
	include_narrower: bool,
}
impl QueryExpander {
	pub fn new(
		cfg: &sieve_config::Expansion,
		concepts: Arc<dyn ConceptLookup>,
		lexicon: Arc<dyn LexicalLookup>,
	) -> Self {
		Self {
			concepts,
			lexicon,
			selector: synset::selector_from_config(cfg),
			weights: ExpansionWeights::from(cfg),
			domain_hints: cfg.domain_hints.clone(),
			max_corpus_terms: cfg.max_corpus_terms as usize,
			max_lexical_terms: cfg.max_lexical_terms as usize,
			include_narrower: cfg.include_narrower,
		}
	}

	pub fn with_selector(mut self, selector: Box<dyn SynsetSelector>) -> Self {
		self.selector = selector;

		self
	}

	pub fn selector_name(&self) -> &'static str {
		self.selector.name()
	}

	pub async fn expand(&self, query: &str) -> ExpandedQuery {
		let original = terms::normalize_terms(query);

		if original.is_empty() {
			return ExpandedQuery::unexpanded(original);
		}

		let (corpus, lexical) = future::join(
			future::join_all(original.iter().map(|term| self.corpus_terms(term))),
			future::join_all(original.iter().map(|term| self.lexical_terms(term, &original))),
		)
		.await;

		ExpandedQuery::compose(
			original,
			corpus.into_iter().flatten().collect(),
			lexical.into_iter().flatten().collect(),
			self.weights,
		)
	}

	/// Warms the lexical lookup for `terms` out of band. Never called from search.
	pub async fn prewarm(&self, terms: &[String], concurrency: usize) -> Result<PrewarmReport> {
		self.lexicon.prewarm(terms, concurrency).await
	}

	async fn corpus_terms(&self, term: &str) -> Vec<String> {
		let related = match self.concepts.related_terms(term).await {
			Ok(related) => related,
			Err(err) => {
				tracing::warn!(error = %err, term, "Corpus concept lookup failed.");

				return Vec::new();
			},
		};

		collect_terms(related.iter(), term, self.max_corpus_terms)
	}

	async fn lexical_terms(&self, term: &str, query_terms: &[String]) -> Vec<String> {
		let senses = match self.lexicon.senses(term).await {
			Ok(senses) => senses,
			Err(err) => {
				tracing::warn!(error = %err, term, "Lexical lookup failed.");

				return Vec::new();
			},
		};

		if senses.is_empty() {
			return Vec::new();
		}

		let context = SelectionContext { query_terms, domain_hints: &self.domain_hints };
		let sense = match self.selector.select(&senses, &context) {
			Ok(sense) => sense,
			Err(err) => {
				tracing::warn!(
					error = %err,
					term,
					selector = self.selector.name(),
					"Sense selection failed."
				);

				return Vec::new();
			},
		};

		collect_terms(self.lemmas(sense), term, self.max_lexical_terms)
	}

	fn lemmas<'s>(&self, sense: &'s SynsetCandidate) -> impl Iterator<Item = &'s String> {
		let narrower: &[String] = if self.include_narrower { &sense.narrower } else { &[] };

		sense.synonyms.iter().chain(sense.broader.iter()).chain(narrower.iter())
	}
}

/// Normalizes and dedupes `candidates`, skipping `term` itself, and keeps at most `max`.
fn collect_terms<'s>(
	candidates: impl Iterator<Item = &'s String>,
	term: &str,
	max: usize,
) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for candidate in candidates {
		if out.len() >= max {
			break;
		}

		let Some(normalized) = terms::normalize_related_term(candidate) else {
			continue;
		};

		if normalized == term {
			continue;
		}
		if seen.insert(normalized.clone()) {
			out.push(normalized);
		}
	}

	out
}
