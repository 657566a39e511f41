pub mod cache;
pub mod rank;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sieve_config::Config;
use sieve_domain::{CollectionKind, ExpandedQuery, ScoreComponents, WeightProfile, score_gap};

use self::{
	cache::{build_search_cache_key, cache_key_prefix},
	rank::{BaselineProfiles, ScoringLimits},
};
use crate::{
	Error, PrewarmReport, Providers, QueryExpander, ResilienceExecutor, Result, ResultCache,
	VectorCollection,
};

const DEFAULT_RESILIENCE_PROFILE: &str = "hybrid_search";
const DEFAULT_RESILIENCE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RESILIENCE_MAX_CONCURRENT: u32 = 8;
const DEFAULT_RESILIENCE_MAX_QUEUE_DEPTH: u32 = 64;

/// One row returned by a vector-searchable collection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateRow {
	pub id: String,
	pub text: String,
	pub title_path: String,
	#[serde(default)]
	pub concepts: Vec<String>,
	/// Similarity distance, lower is closer. `None` is treated as a perfect match.
	pub distance: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoredResult {
	#[serde(flatten)]
	pub row: CandidateRow,
	pub components: ScoreComponents,
	pub hybrid_score: f64,
	pub matched_concepts: Vec<String>,
	pub expanded_terms: Vec<String>,
}

/// Output of one guarded search pass: the expansion, the profile it was scored with and the
/// ranked, truncated results.
#[derive(Clone, Debug, Serialize)]
pub struct SearchRun {
	pub expanded: ExpandedQuery,
	pub effective_profile: WeightProfile,
	pub results: Vec<ScoredResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchDebugReport {
	pub collection: String,
	pub kind: CollectionKind,
	pub query: String,
	pub limit: usize,
	pub selector: &'static str,
	pub expanded: ExpandedQuery,
	pub effective_profile: WeightProfile,
	pub results: Vec<ScoredResult>,
}

/// Named limits a [`ResilienceExecutor`] enforces around one search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResilienceProfile {
	pub name: String,
	pub timeout_ms: u64,
	pub max_concurrent: u32,
	pub max_queue_depth: u32,
}
impl Default for ResilienceProfile {
	fn default() -> Self {
		Self {
			name: DEFAULT_RESILIENCE_PROFILE.to_string(),
			timeout_ms: DEFAULT_RESILIENCE_TIMEOUT_MS,
			max_concurrent: DEFAULT_RESILIENCE_MAX_CONCURRENT,
			max_queue_depth: DEFAULT_RESILIENCE_MAX_QUEUE_DEPTH,
		}
	}
}
impl From<&sieve_config::Resilience> for ResilienceProfile {
	fn from(cfg: &sieve_config::Resilience) -> Self {
		Self {
			name: cfg.name.clone(),
			timeout_ms: cfg.timeout_ms,
			max_concurrent: cfg.max_concurrent,
			max_queue_depth: cfg.max_queue_depth,
		}
	}
}

/// Query expansion, embedding, vector search and five-signal re-ranking over any
/// [`VectorCollection`].
pub struct HybridSearch {
	providers: Providers,
	expander: QueryExpander,
	profiles: BaselineProfiles,
	limits: ScoringLimits,
	overfetch_factor: usize,
	score_gap_min: f64,
	prewarm_concurrency: usize,
	cache: Option<Arc<dyn ResultCache>>,
	resilience: Option<Arc<dyn ResilienceExecutor>>,
	resilience_profile: ResilienceProfile,
}
impl HybridSearch {
	pub fn new(cfg: &Config, providers: Providers) -> Result<Self> {
		let profiles = BaselineProfiles::from_config(&cfg.search.profiles)?;
		let expander = QueryExpander::new(
			&cfg.expansion,
			providers.concepts.clone(),
			providers.lexicon.clone(),
		);
		let resilience_profile =
			cfg.resilience.as_ref().map(ResilienceProfile::from).unwrap_or_default();

		Ok(Self {
			providers,
			expander,
			profiles,
			limits: ScoringLimits {
				max_matched_concepts: cfg
					.search
					.max_matched_concepts
					.clamp(1, sieve_config::MAX_MATCHED_CONCEPTS) as usize,
				max_expanded_terms: cfg
					.search
					.max_expanded_terms
					.clamp(1, sieve_config::MAX_EXPANDED_TERMS) as usize,
			},
			overfetch_factor: cfg.search.overfetch_factor.max(1) as usize,
			score_gap_min: cfg.search.score_gap_min,
			prewarm_concurrency: cfg.lexicon.prewarm_concurrency as usize,
			cache: None,
			resilience: None,
			resilience_profile,
		})
	}

	pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	pub fn with_resilience(mut self, executor: Arc<dyn ResilienceExecutor>) -> Self {
		self.resilience = Some(executor);

		self
	}

	pub fn with_expander(mut self, expander: QueryExpander) -> Self {
		self.expander = expander;

		self
	}

	pub fn expander(&self) -> &QueryExpander {
		&self.expander
	}

	pub fn resilience_profile(&self) -> &ResilienceProfile {
		&self.resilience_profile
	}

	/// Ranked results for `query`, at most `limit` of them.
	///
	/// Non-debug calls read and fill the result cache when one is attached. Debug calls bypass the
	/// cache and log the expansion and per-result score breakdown.
	pub async fn search(
		&self,
		collection: &dyn VectorCollection,
		query: &str,
		limit: usize,
		debug: bool,
	) -> Result<Vec<ScoredResult>> {
		validate_request(query, limit)?;

		if debug {
			let run = self.guarded_run(collection, query, limit).await?;

			log_debug(collection, query, &run);

			return Ok(run.results);
		}

		let cache_key = self.cache.as_ref().and_then(|_| {
			match build_search_cache_key(collection.name(), query, limit) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = collection.name(),
						"Cache key build failed."
					);

					None
				},
			}
		});

		if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_ref()) {
			match cache.get(key).await {
				Ok(Some(results)) => {
					tracing::info!(
						collection = collection.name(),
						cache_key_prefix = cache_key_prefix(key),
						hit = true,
						result_count = results.len(),
						"Cache hit."
					);

					return Ok(results);
				},
				Ok(None) => {
					tracing::info!(
						collection = collection.name(),
						cache_key_prefix = cache_key_prefix(key),
						hit = false,
						"Cache miss."
					);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = collection.name(),
						cache_key_prefix = cache_key_prefix(key),
						"Cache read failed."
					);
				},
			}
		}

		let run = self.guarded_run(collection, query, limit).await?;

		if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_ref()) {
			match cache.set(key, &run.results).await {
				Ok(()) => {
					tracing::info!(
						collection = collection.name(),
						cache_key_prefix = cache_key_prefix(key),
						result_count = run.results.len(),
						"Cache stored."
					);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = collection.name(),
						cache_key_prefix = cache_key_prefix(key),
						"Cache write failed."
					);
				},
			}
		}

		Ok(run.results)
	}

	/// Runs a debug search and also returns what was logged.
	pub async fn search_debug(
		&self,
		collection: &dyn VectorCollection,
		query: &str,
		limit: usize,
	) -> Result<SearchDebugReport> {
		validate_request(query, limit)?;

		let run = self.guarded_run(collection, query, limit).await?;

		log_debug(collection, query, &run);

		Ok(SearchDebugReport {
			collection: collection.name().to_string(),
			kind: collection.kind(),
			query: query.to_string(),
			limit,
			selector: self.expander.selector_name(),
			expanded: run.expanded,
			effective_profile: run.effective_profile,
			results: run.results,
		})
	}

	/// [`HybridSearch::search`] followed by truncation at the largest score drop.
	pub async fn search_with_score_gap(
		&self,
		collection: &dyn VectorCollection,
		query: &str,
		limit: usize,
	) -> Result<Vec<ScoredResult>> {
		let results = self.search(collection, query, limit, false).await?;
		let before = results.len();
		let kept = score_gap::filter_by_score_gap(results, self.score_gap_min, |result| {
			result.hybrid_score
		});

		tracing::debug!(
			collection = collection.name(),
			before,
			after = kept.len(),
			min_gap = self.score_gap_min,
			"Score-gap filter applied."
		);

		Ok(kept)
	}

	/// Fills the lexical cache for `terms` with the configured concurrency. Meant for ingestion
	/// time.
	pub async fn prewarm_lexicon(&self, terms: &[String]) -> Result<PrewarmReport> {
		self.expander.prewarm(terms, self.prewarm_concurrency).await
	}

	async fn guarded_run(
		&self,
		collection: &dyn VectorCollection,
		query: &str,
		limit: usize,
	) -> Result<SearchRun> {
		let Some(executor) = self.resilience.as_ref() else {
			return self.run(collection, query, limit).await;
		};

		executor
			.execute(Box::pin(self.run(collection, query, limit)), &self.resilience_profile)
			.await
	}

	async fn run(
		&self,
		collection: &dyn VectorCollection,
		query: &str,
		limit: usize,
	) -> Result<SearchRun> {
		let expanded = self.expander.expand(query).await;
		let embedding = self.providers.embedding.embed(query).await?;
		let k = limit.saturating_mul(self.overfetch_factor);
		let rows = collection.vector_search(&embedding, k).await?;
		let effective_profile = self.profiles.get(collection.kind()).effective(&expanded);
		let mut results = rows
			.into_iter()
			.map(|row| rank::score_row(row, &expanded, &effective_profile, self.limits))
			.collect::<Result<Vec<_>>>()?;

		rank::sort_by_score(&mut results);
		results.truncate(limit);

		Ok(SearchRun { expanded, effective_profile, results })
	}
}

fn validate_request(query: &str, limit: usize) -> Result<()> {
	if query.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
	}
	if limit == 0 {
		return Err(Error::InvalidRequest {
			message: "Limit must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn log_debug(collection: &dyn VectorCollection, query: &str, run: &SearchRun) {
	let expansion = serde_json::to_string(&run.expanded).unwrap_or_default();
	let profile = serde_json::to_string(&run.effective_profile).unwrap_or_default();

	tracing::info!(
		collection = collection.name(),
		kind = collection.kind().as_str(),
		query,
		expansion = %expansion,
		effective_profile = %profile,
		"Search debug expansion."
	);

	for (rank, result) in run.results.iter().enumerate() {
		let components = serde_json::to_string(&result.components).unwrap_or_default();

		tracing::info!(
			collection = collection.name(),
			rank = rank + 1,
			id = result.row.id.as_str(),
			hybrid_score = result.hybrid_score,
			components = %components,
			matched_concepts = ?result.matched_concepts,
			"Search debug result."
		);
	}
}
