use std::{sync::Arc, time::Duration};

use sieve_config::{Config, Resilience};
use sieve_domain::CollectionKind;
use sieve_service::{
	Error, HybridSearch, Providers, ScoredResult, search::cache::MemoryResultCache,
};
use sieve_testkit::{
	FailingCache, FixedEmbedding, MemoryCollection, PassthroughExecutor, RejectingExecutor,
	StaticConcepts, StaticLexicon, TimeoutExecutor, sense, test_config,
};

struct Harness {
	search: HybridSearch,
	embedding: Arc<FixedEmbedding>,
}

fn harness_with(cfg: &Config, embedding: FixedEmbedding) -> Harness {
	let embedding = Arc::new(embedding);
	let concepts = StaticConcepts::new()
		.with("ownership", &["Borrow Checker", "Move Semantics"])
		.with("lifetimes", &["borrow checker"]);
	let lexicon = StaticLexicon::new()
		.with("ownership", vec![sense(&["ownership", "possession"], "the act of having", &[])]);
	let providers = Providers::new(embedding.clone(), Arc::new(concepts), Arc::new(lexicon));
	let search = HybridSearch::new(cfg, providers).expect("Search must build.");

	Harness { search, embedding }
}

fn harness() -> Harness {
	harness_with(&test_config(), FixedEmbedding::new(vec![1.0, 0.0, 0.0]))
}

fn docs(kind: CollectionKind) -> MemoryCollection {
	MemoryCollection::new("docs", kind)
		.with_row(
			"ownership",
			"/book/ownership.md",
			"Ownership rules and the borrow checker explained with examples.",
			&["Ownership", "Borrow Checker"],
			vec![0.9, 0.1, 0.0],
		)
		.with_row(
			"lifetimes",
			"/book/lifetimes.md",
			"Lifetimes describe how long references stay valid.",
			&["Lifetimes"],
			vec![0.7, 0.3, 0.0],
		)
		.with_row(
			"cooking",
			"/recipes/bread.md",
			"Knead the dough and let it rise overnight.",
			&["Baking"],
			vec![0.0, 0.0, 1.0],
		)
		.with_row(
			"gardening",
			"/garden/tomatoes.md",
			"Tomatoes need sun and regular watering.",
			&["Gardening"],
			vec![0.0, 1.0, 0.0],
		)
}

fn ids(results: &[ScoredResult]) -> Vec<&str> {
	results.iter().map(|result| result.row.id.as_str()).collect()
}

#[tokio::test]
async fn search_over_fetches_and_truncates_to_limit() {
	let harness = harness();
	let collection = docs(CollectionKind::Chunk);
	let results = harness
		.search
		.search(&collection, "ownership", 2, false)
		.await
		.expect("Search must succeed.");

	assert_eq!(collection.requested_k(), vec![6]);
	assert_eq!(results.len(), 2);
	assert_eq!(results[0].row.id, "ownership");
}

#[tokio::test]
async fn results_are_sorted_and_bounded() {
	let harness = harness();
	let collection = docs(CollectionKind::Summary);
	let results = harness
		.search
		.search(&collection, "ownership lifetimes borrow", 10, false)
		.await
		.expect("Search must succeed.");

	assert_eq!(results.len(), 4);

	for pair in results.windows(2) {
		assert!(pair[0].hybrid_score >= pair[1].hybrid_score);
	}
	for result in &results {
		assert!((0.0..=1.0).contains(&result.hybrid_score));
		assert!(result.matched_concepts.len() <= 5);
		assert!(result.expanded_terms.len() <= 10);
	}

	assert_eq!(&ids(&results)[..2], ["ownership", "lifetimes"]);
	assert!(results[0].matched_concepts.contains(&"Ownership".to_string()));
}

#[tokio::test]
async fn cached_results_skip_the_pipeline() {
	let harness = harness();
	let cache = Arc::new(MemoryResultCache::new(8, Duration::from_secs(60)));
	let search = harness.search.with_cache(cache.clone());
	let collection = docs(CollectionKind::Chunk);
	let first = search.search(&collection, "ownership", 3, false).await.expect("First search.");
	let second = search.search(&collection, "ownership", 3, false).await.expect("Second search.");

	assert_eq!(first, second);
	assert_eq!(harness.embedding.calls(), 1);
	assert_eq!(collection.requested_k().len(), 1);
	assert_eq!(cache.len(), 1);

	search.search(&collection, "ownership", 2, false).await.expect("Different limit.");

	assert_eq!(harness.embedding.calls(), 2);
}

#[tokio::test]
async fn debug_searches_bypass_the_cache() {
	let harness = harness();
	let cache = Arc::new(MemoryResultCache::new(8, Duration::from_secs(60)));
	let search = harness.search.with_cache(cache.clone());
	let collection = docs(CollectionKind::Chunk);

	search.search(&collection, "ownership", 3, true).await.expect("Debug search.");

	assert!(cache.is_empty());

	search.search(&collection, "ownership", 3, false).await.expect("Normal search.");
	search.search(&collection, "ownership", 3, true).await.expect("Debug search.");

	assert_eq!(harness.embedding.calls(), 3);
}

#[tokio::test]
async fn cache_failures_do_not_fail_the_search() {
	let harness = harness();
	let cache = Arc::new(FailingCache::default());
	let search = harness.search.with_cache(cache.clone());
	let collection = docs(CollectionKind::Chunk);
	let results =
		search.search(&collection, "ownership", 2, false).await.expect("Search must succeed.");

	assert_eq!(results.len(), 2);
	assert_eq!(cache.calls(), 2);
}

#[tokio::test]
async fn debug_report_matches_plain_results() {
	let harness = harness();
	let collection = docs(CollectionKind::Summary);
	let plain = harness
		.search
		.search(&collection, "ownership", 3, false)
		.await
		.expect("Search must succeed.");
	let report = harness
		.search
		.search_debug(&collection, "ownership", 3)
		.await
		.expect("Debug search must succeed.");

	assert_eq!(report.results, plain);
	assert_eq!(report.kind, CollectionKind::Summary);
	assert_eq!(report.selector, "first_sense");
	assert_eq!(report.expanded.original_terms(), ["ownership"]);
	assert_eq!(report.expanded.corpus_terms(), ["borrow checker", "move semantics"]);
	assert_eq!(report.expanded.wordnet_terms(), ["possession"]);
	assert!((report.effective_profile.sum() - 1.0).abs() < 1e-9);
	// Single term with a corpus match: 0.10 * 1.5.
	assert!((report.effective_profile.wordnet - 0.15).abs() < 1e-9);
}

#[tokio::test]
async fn single_term_without_corpus_match_doubles_lexical_weight() {
	let harness = harness();
	let collection = docs(CollectionKind::Summary);
	let report = harness
		.search
		.search_debug(&collection, "dough", 2)
		.await
		.expect("Debug search must succeed.");

	assert!((report.effective_profile.wordnet - 0.20).abs() < 1e-9);
	assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn score_gap_keeps_the_leading_cluster() {
	let harness = harness();
	let collection = MemoryCollection::new("notes", CollectionKind::Chunk)
		.with_row("a", "/docs/ownership.md", "ownership rules", &[], vec![1.0, 0.0, 0.0])
		.with_row("b", "/notes/ownership.md", "ownership rules", &[], vec![1.0, 0.0, 0.0])
		.with_row("c", "/misc/other.md", "unrelated words", &[], vec![0.0, 1.0, 0.0]);
	let full = harness
		.search
		.search(&collection, "ownership", 3, false)
		.await
		.expect("Search must succeed.");
	let kept = harness
		.search
		.search_with_score_gap(&collection, "ownership", 3)
		.await
		.expect("Score-gap search must succeed.");

	assert_eq!(full.len(), 3);
	assert_eq!(ids(&kept), ["a", "b"]);
	assert_eq!(&full[..2], kept.as_slice());
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_io() {
	let harness = harness();
	let collection = docs(CollectionKind::Chunk);

	for (query, limit) in [("   ", 5), ("ownership", 0)] {
		let err = harness
			.search
			.search(&collection, query, limit, false)
			.await
			.expect_err("Expected invalid request.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	assert_eq!(harness.embedding.calls(), 0);
	assert!(collection.requested_k().is_empty());
}

#[tokio::test]
async fn collaborator_failures_propagate() {
	let failing = harness_with(&test_config(), FixedEmbedding::failing());
	let collection = docs(CollectionKind::Chunk);
	let err = failing
		.search
		.search(&collection, "ownership", 3, false)
		.await
		.expect_err("Expected embedding failure.");

	assert!(matches!(err, Error::Provider { .. }));

	let harness = harness();
	let broken = MemoryCollection::failing("broken", CollectionKind::Chunk);
	let err = harness
		.search
		.search(&broken, "ownership", 3, false)
		.await
		.expect_err("Expected collection failure.");

	assert!(matches!(err, Error::Collection { .. }));
}

#[tokio::test]
async fn malformed_rows_are_precondition_violations() {
	let harness = harness();
	let collection = docs(CollectionKind::Chunk).with_row("empty", "", "", &[], vec![1.0, 0.0, 0.0]);
	let err = harness
		.search
		.search(&collection, "ownership", 3, false)
		.await
		.expect_err("Expected precondition violation.");

	assert!(matches!(err, Error::Precondition { .. }));
}

#[tokio::test]
async fn resilience_executor_receives_the_configured_profile() {
	let mut cfg = test_config();

	cfg.resilience = Some(Resilience {
		name: "catalog_search".to_string(),
		timeout_ms: 2_000,
		max_concurrent: 4,
		max_queue_depth: 16,
	});

	let harness = harness_with(&cfg, FixedEmbedding::new(vec![1.0, 0.0, 0.0]));
	let executor = Arc::new(PassthroughExecutor::default());
	let search = harness.search.with_resilience(executor.clone());
	let collection = docs(CollectionKind::Chunk);

	search.search(&collection, "ownership", 2, false).await.expect("Search must succeed.");

	let profiles = executor.profiles();

	assert_eq!(profiles.len(), 1);
	assert_eq!(profiles[0].name, "catalog_search");
	assert_eq!(profiles[0].max_queue_depth, 16);
}

#[tokio::test]
async fn rejections_propagate_without_retry() {
	let harness = harness();
	let executor = Arc::new(RejectingExecutor::default());
	let search = harness.search.with_resilience(executor.clone());
	let collection = docs(CollectionKind::Chunk);
	let err = search
		.search(&collection, "ownership", 2, false)
		.await
		.expect_err("Expected rejection.");

	assert!(matches!(err, Error::Rejected { .. }));
	assert_eq!(executor.rejections(), 1);
	assert_eq!(harness.embedding.calls(), 0);
	assert!(collection.requested_k().is_empty());
}

#[tokio::test]
async fn timeouts_propagate_as_is() {
	let mut cfg = test_config();

	cfg.resilience = Some(Resilience {
		name: "tight".to_string(),
		timeout_ms: 10,
		max_concurrent: 1,
		max_queue_depth: 1,
	});

	let slow = FixedEmbedding::new(vec![1.0, 0.0, 0.0]).with_delay(Duration::from_millis(500));
	let harness = harness_with(&cfg, slow);
	let search = harness.search.with_resilience(Arc::new(TimeoutExecutor));
	let collection = docs(CollectionKind::Chunk);
	let err = search
		.search(&collection, "ownership", 2, false)
		.await
		.expect_err("Expected timeout.");

	assert!(matches!(err, Error::Timeout { .. }));
	assert_eq!(harness.embedding.calls(), 1);
	assert!(collection.requested_k().is_empty());
}

#[tokio::test]
async fn invalid_profiles_fail_construction() {
	let mut cfg = test_config();

	cfg.search.profiles.chunk.vector = 0.9;

	let providers = Providers::new(
		Arc::new(FixedEmbedding::new(vec![1.0])),
		Arc::new(StaticConcepts::new()),
		Arc::new(StaticLexicon::new()),
	);
	let err = HybridSearch::new(&cfg, providers).err().expect("Expected invalid profile.");

	assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn result_caps_never_exceed_their_upper_bounds() {
	let mut cfg = test_config();

	cfg.search.max_matched_concepts = 8;
	cfg.search.max_expanded_terms = 30;

	let harness = harness_with(&cfg, FixedEmbedding::new(vec![1.0, 0.0, 0.0]));
	let collection = MemoryCollection::new("docs", CollectionKind::Concept).with_row(
		"ownership",
		"/book/ownership.md",
		"Ownership rules for borrowing, moving and dropping values.",
		&[
			"Ownership",
			"Ownership Rules",
			"Shared Ownership",
			"Unique Ownership",
			"Ownership Transfer",
			"Ownership Graph",
			"Partial Ownership",
			"Ownership Model",
		],
		vec![1.0, 0.0, 0.0],
	);
	let query = "ownership rules borrowing moving dropping values scopes traits generics closures \
		iterators slices";
	let results =
		harness.search.search(&collection, query, 3, false).await.expect("Search must succeed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].matched_concepts.len(), 5);
	assert_eq!(results[0].expanded_terms.len(), 10);
}
