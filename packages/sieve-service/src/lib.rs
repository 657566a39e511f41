pub mod expansion;
pub mod lexicon;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use expansion::QueryExpander;
pub use lexicon::{CachedLexicon, PrewarmReport};
pub use search::{
	CandidateRow, HybridSearch, ResilienceProfile, ScoredResult, SearchDebugReport, SearchRun,
};

use std::{future::Future, pin::Pin, sync::Arc};

use sieve_domain::{CollectionKind, SynsetCandidate};
use sieve_providers::embedding::HttpEmbedder;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of search work handed to a [`ResilienceExecutor`].
pub type SearchOperation<'a> = BoxFuture<'a, Result<SearchRun>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait VectorCollection
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn kind(&self) -> CollectionKind;

	/// Up to `k` nearest rows, closest first.
	fn vector_search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<CandidateRow>>>;
}

/// Related concept names known to the indexed corpus.
pub trait ConceptLookup
where
	Self: Send + Sync,
{
	fn related_terms<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// Senses of a term from a general-purpose lexical database.
pub trait LexicalLookup
where
	Self: Send + Sync,
{
	fn senses<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SynsetCandidate>>>;

	/// Fetches senses for many terms ahead of query time with at most `concurrency` lookups in
	/// flight. Lookups without a cache have nothing to warm.
	fn prewarm<'a>(
		&'a self,
		_terms: &'a [String],
		concurrency: usize,
	) -> BoxFuture<'a, Result<PrewarmReport>> {
		Box::pin(async move {
			if concurrency == 0 {
				return Err(Error::InvalidRequest {
					message: "Prewarm concurrency must be greater than zero.".to_string(),
				});
			}

			Ok(PrewarmReport::default())
		})
	}
}

pub trait ResultCache
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<ScoredResult>>>>;

	fn set<'a>(&'a self, key: &'a str, results: &'a [ScoredResult]) -> BoxFuture<'a, Result<()>>;
}

/// Runs a search under concurrency, queueing and timeout limits. Rejections and timeouts are
/// reported as [`Error::Rejected`] and [`Error::Timeout`] and are never retried by the caller.
pub trait ResilienceExecutor
where
	Self: Send + Sync,
{
	fn execute<'a>(
		&'a self,
		operation: SearchOperation<'a>,
		profile: &'a ResilienceProfile,
	) -> SearchOperation<'a>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub concepts: Arc<dyn ConceptLookup>,
	pub lexicon: Arc<dyn LexicalLookup>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		concepts: Arc<dyn ConceptLookup>,
		lexicon: Arc<dyn LexicalLookup>,
	) -> Self {
		Self { embedding, concepts, lexicon }
	}
}

impl EmbeddingProvider for HttpEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(HttpEmbedder::embed(self, text).await?) })
	}
}
