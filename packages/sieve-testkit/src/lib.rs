use std::{
	collections::{HashMap, HashSet},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Map;

use sieve_config::{
	Cache, Config, EmbeddingProviderConfig, Expansion, Lexicon, Providers, Search, Service,
};
use sieve_domain::{CollectionKind, SynsetCandidate};
use sieve_service::{
	BoxFuture, CandidateRow, ConceptLookup, EmbeddingProvider, Error, LexicalLookup,
	ResilienceExecutor, ResilienceProfile, Result, ResultCache, ScoredResult, SearchOperation,
	VectorCollection,
};

/// A valid configuration with default expansion, search and cache sections and no resilience
/// profile.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: 3,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		expansion: Expansion::default(),
		search: Search::default(),
		cache: Cache::default(),
		resilience: None,
		lexicon: Lexicon::default(),
	}
}

pub fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

pub fn sense(synonyms: &[&str], definition: &str, broader: &[&str]) -> SynsetCandidate {
	SynsetCandidate {
		synonyms: strings(synonyms),
		definition: definition.to_string(),
		broader: strings(broader),
		narrower: Vec::new(),
	}
}

/// Concept graph keyed by lowercase term.
#[derive(Default)]
pub struct StaticConcepts {
	related: HashMap<String, Vec<String>>,
	failing: HashSet<String>,
	delays: HashMap<String, Duration>,
	calls: Mutex<Vec<String>>,
}
impl StaticConcepts {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, term: &str, related: &[&str]) -> Self {
		self.related.insert(term.to_lowercase(), strings(related));

		self
	}

	pub fn failing_on(mut self, term: &str) -> Self {
		self.failing.insert(term.to_lowercase());

		self
	}

	/// Delays every lookup of `term` by `delay`.
	pub fn delayed(mut self, term: &str, delay: Duration) -> Self {
		self.delays.insert(term.to_lowercase(), delay);

		self
	}

	/// Terms looked up so far, in call order.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl ConceptLookup for StaticConcepts {
	fn related_terms<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let key = term.to_lowercase();

			self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(key.clone());

			if let Some(delay) = self.delays.get(&key) {
				tokio::time::sleep(*delay).await;
			}
			if self.failing.contains(&key) {
				return Err(Error::Lookup {
					message: format!("Concept lookup failed for {key}."),
				});
			}

			Ok(self.related.get(&key).cloned().unwrap_or_default())
		})
	}
}

/// Lexicon keyed by lowercase term. Counts every `senses` call and tracks how many run at once.
#[derive(Default)]
pub struct StaticLexicon {
	senses: HashMap<String, Vec<SynsetCandidate>>,
	failing: HashSet<String>,
	delays: HashMap<String, Duration>,
	default_delay: Option<Duration>,
	lookups: AtomicUsize,
	in_flight: AtomicUsize,
	peak_in_flight: AtomicUsize,
}
impl StaticLexicon {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, term: &str, senses: Vec<SynsetCandidate>) -> Self {
		self.senses.insert(term.to_lowercase(), senses);

		self
	}

	pub fn failing_on(mut self, term: &str) -> Self {
		self.failing.insert(term.to_lowercase());

		self
	}

	/// Delays every lookup of `term` by `delay`.
	pub fn delayed(mut self, term: &str, delay: Duration) -> Self {
		self.delays.insert(term.to_lowercase(), delay);

		self
	}

	/// Delays lookups of terms without their own delay.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.default_delay = Some(delay);

		self
	}

	pub fn lookups(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}

	/// Most lookups observed running at the same time.
	pub fn peak_in_flight(&self) -> usize {
		self.peak_in_flight.load(Ordering::SeqCst)
	}
}
impl LexicalLookup for StaticLexicon {
	fn senses<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SynsetCandidate>>> {
		Box::pin(async move {
			let key = term.to_lowercase();

			self.lookups.fetch_add(1, Ordering::SeqCst);

			let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

			self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

			if let Some(delay) = self.delays.get(&key).copied().or(self.default_delay) {
				tokio::time::sleep(delay).await;
			}

			self.in_flight.fetch_sub(1, Ordering::SeqCst);

			if self.failing.contains(&key) {
				return Err(Error::Lookup {
					message: format!("Lexical lookup failed for {key}."),
				});
			}

			Ok(self.senses.get(&key).cloned().unwrap_or_default())
		})
	}
}

/// Returns a per-text vector when one is registered and `fallback` otherwise.
pub struct FixedEmbedding {
	vectors: HashMap<String, Vec<f32>>,
	fallback: Vec<f32>,
	delay: Option<Duration>,
	failing: bool,
	calls: AtomicUsize,
}
impl FixedEmbedding {
	pub fn new(fallback: Vec<f32>) -> Self {
		Self {
			vectors: HashMap::new(),
			fallback,
			delay: None,
			failing: false,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn failing() -> Self {
		Self { failing: true, ..Self::new(Vec::new()) }
	}

	pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
		self.vectors.insert(text.to_string(), vector);

		self
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.failing {
				return Err(Error::Provider {
					message: "Embedding provider unavailable.".to_string(),
				});
			}

			Ok(self.vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
		})
	}
}

/// Brute-force collection ranked by cosine distance.
pub struct MemoryCollection {
	name: String,
	kind: CollectionKind,
	rows: Vec<(CandidateRow, Vec<f32>)>,
	failing: bool,
	requested: Mutex<Vec<usize>>,
}
impl MemoryCollection {
	pub fn new(name: &str, kind: CollectionKind) -> Self {
		Self {
			name: name.to_string(),
			kind,
			rows: Vec::new(),
			failing: false,
			requested: Mutex::new(Vec::new()),
		}
	}

	pub fn failing(name: &str, kind: CollectionKind) -> Self {
		Self { failing: true, ..Self::new(name, kind) }
	}

	pub fn with_row(
		mut self,
		id: &str,
		title_path: &str,
		text: &str,
		concepts: &[&str],
		embedding: Vec<f32>,
	) -> Self {
		let row = CandidateRow {
			id: id.to_string(),
			text: text.to_string(),
			title_path: title_path.to_string(),
			concepts: strings(concepts),
			distance: None,
		};

		self.rows.push((row, embedding));

		self
	}

	/// The `k` of every `vector_search` call so far.
	pub fn requested_k(&self) -> Vec<usize> {
		self.requested.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl VectorCollection for MemoryCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn kind(&self) -> CollectionKind {
		self.kind
	}

	fn vector_search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<CandidateRow>>> {
		Box::pin(async move {
			self.requested.lock().unwrap_or_else(|err| err.into_inner()).push(k);

			if self.failing {
				return Err(Error::Collection {
					message: format!("Collection {} is unavailable.", self.name),
				});
			}

			let mut scored: Vec<CandidateRow> = self
				.rows
				.iter()
				.map(|(row, embedding)| CandidateRow {
					distance: Some(cosine_distance(vector, embedding)),
					..row.clone()
				})
				.collect();

			scored.sort_by(|a, b| {
				a.distance.unwrap_or(f64::MAX).total_cmp(&b.distance.unwrap_or(f64::MAX))
			});
			scored.truncate(k);

			Ok(scored)
		})
	}
}

/// `1 - cosine similarity`, or 1.0 when either vector has zero length or the lengths differ.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
	if a.len() != b.len() || a.is_empty() {
		return 1.0;
	}

	let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (*x as f64, *y as f64);

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A result cache whose every call fails.
#[derive(Default)]
pub struct FailingCache {
	calls: AtomicUsize,
}
impl FailingCache {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl ResultCache for FailingCache {
	fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<Vec<ScoredResult>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err(Error::Cache { message: "Cache backend unavailable.".to_string() })
		})
	}

	fn set<'a>(
		&'a self,
		_key: &'a str,
		_results: &'a [ScoredResult],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err(Error::Cache { message: "Cache backend unavailable.".to_string() })
		})
	}
}

/// Runs every operation as-is and remembers the profiles it was given.
#[derive(Default)]
pub struct PassthroughExecutor {
	profiles: Mutex<Vec<ResilienceProfile>>,
}
impl PassthroughExecutor {
	pub fn profiles(&self) -> Vec<ResilienceProfile> {
		self.profiles.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl ResilienceExecutor for PassthroughExecutor {
	fn execute<'a>(
		&'a self,
		operation: SearchOperation<'a>,
		profile: &'a ResilienceProfile,
	) -> SearchOperation<'a> {
		self.profiles.lock().unwrap_or_else(|err| err.into_inner()).push(profile.clone());

		operation
	}
}

/// Rejects every operation without polling it, as a full bulkhead queue would.
#[derive(Default)]
pub struct RejectingExecutor {
	rejections: AtomicUsize,
}
impl RejectingExecutor {
	pub fn rejections(&self) -> usize {
		self.rejections.load(Ordering::SeqCst)
	}
}
impl ResilienceExecutor for RejectingExecutor {
	fn execute<'a>(
		&'a self,
		_operation: SearchOperation<'a>,
		profile: &'a ResilienceProfile,
	) -> SearchOperation<'a> {
		self.rejections.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			Err(Error::Rejected { message: format!("Profile {} queue is full.", profile.name) })
		})
	}
}

/// Enforces `profile.timeout_ms` with a tokio timer.
#[derive(Default)]
pub struct TimeoutExecutor;
impl ResilienceExecutor for TimeoutExecutor {
	fn execute<'a>(
		&'a self,
		operation: SearchOperation<'a>,
		profile: &'a ResilienceProfile,
	) -> SearchOperation<'a> {
		Box::pin(async move {
			let limit = Duration::from_millis(profile.timeout_ms);

			match tokio::time::timeout(limit, operation).await {
				Ok(result) => result,
				Err(_) => Err(Error::Timeout {
					message: format!("Profile {} exceeded {} ms.", profile.name, profile.timeout_ms),
				}),
			}
		})
	}
}
