//! Lexical sense cache, populated ahead of query time and read during expansion.

use std::{
	collections::{HashMap, HashSet},
	sync::RwLock,
};

use futures::{StreamExt, stream};
use serde::Serialize;

use sieve_domain::{SynsetCandidate, terms};

use crate::{BoxFuture, Error, LexicalLookup, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PrewarmReport {
	/// Distinct non-blank terms after normalization.
	pub requested: usize,
	/// Terms that were already cached and skipped.
	pub cached: usize,
	pub fetched: usize,
	pub failed: usize,
}

/// Wraps a [`LexicalLookup`] with a term-keyed sense cache. Empty sense lists are cached too.
pub struct CachedLexicon<L> {
	inner: L,
	senses: RwLock<HashMap<String, Vec<SynsetCandidate>>>,
}
impl<L> CachedLexicon<L>
where
	L: LexicalLookup,
{
	pub fn new(inner: L) -> Self {
		Self { inner, senses: RwLock::new(HashMap::new()) }
	}

	pub fn inner(&self) -> &L {
		&self.inner
	}

	pub fn get(&self, term: &str) -> Option<Vec<SynsetCandidate>> {
		let key = terms::normalize_related_term(term)?;

		self.senses.read().unwrap_or_else(|err| err.into_inner()).get(&key).cloned()
	}

	pub fn set(&self, term: &str, senses: Vec<SynsetCandidate>) {
		let Some(key) = terms::normalize_related_term(term) else {
			return;
		};

		self.senses.write().unwrap_or_else(|err| err.into_inner()).insert(key, senses);
	}

	pub fn len(&self) -> usize {
		self.senses.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	async fn fetch(&self, term: &str) -> Result<Vec<SynsetCandidate>> {
		if let Some(hit) = self.get(term) {
			return Ok(hit);
		}

		let senses = self.inner.senses(term).await?;

		self.set(term, senses.clone());

		Ok(senses)
	}

	async fn prewarm_terms(&self, terms: &[String], concurrency: usize) -> Result<PrewarmReport> {
		if concurrency == 0 {
			return Err(Error::InvalidRequest {
				message: "Prewarm concurrency must be greater than zero.".to_string(),
			});
		}

		let mut seen = HashSet::new();
		let unique: Vec<String> = terms
			.iter()
			.filter_map(|term| terms::normalize_related_term(term))
			.filter(|term| seen.insert(term.clone()))
			.collect();
		let mut report = PrewarmReport { requested: unique.len(), ..Default::default() };
		let mut pending = Vec::new();

		for term in unique {
			if self.get(&term).is_some() {
				report.cached += 1;
			} else {
				pending.push(term);
			}
		}

		let outcomes: Vec<(String, Result<Vec<SynsetCandidate>>)> = stream::iter(pending)
			.map(|term| async move {
				let result = self.inner.senses(&term).await;

				(term, result)
			})
			.buffer_unordered(concurrency)
			.collect()
			.await;

		for (term, result) in outcomes {
			match result {
				Ok(senses) => {
					self.set(&term, senses);

					report.fetched += 1;
				},
				Err(err) => {
					tracing::warn!(error = %err, term = term.as_str(), "Lexicon prewarm lookup failed.");

					report.failed += 1;
				},
			}
		}

		tracing::info!(
			requested = report.requested,
			cached = report.cached,
			fetched = report.fetched,
			failed = report.failed,
			concurrency,
			"Lexicon prewarm finished."
		);

		Ok(report)
	}
}
impl<L> LexicalLookup for CachedLexicon<L>
where
	L: LexicalLookup,
{
	fn senses<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SynsetCandidate>>> {
		Box::pin(self.fetch(term))
	}

	fn prewarm<'a>(
		&'a self,
		terms: &'a [String],
		concurrency: usize,
	) -> BoxFuture<'a, Result<PrewarmReport>> {
		Box::pin(self.prewarm_terms(terms, concurrency))
	}
}
