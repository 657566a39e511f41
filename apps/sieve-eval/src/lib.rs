mod memory;

use std::{
	collections::{HashMap, HashSet},
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use sieve_config::Config;
use sieve_domain::{CollectionKind, SynsetCandidate, score_gap, terms};
use sieve_providers::embedding::HttpEmbedder;
use sieve_service::{
	CachedLexicon, CandidateRow, EmbeddingProvider, HybridSearch, PrewarmReport, Providers,
	ScoredResult, search::cache::MemoryResultCache,
};

use crate::memory::{ConceptGraph, DatasetEmbedding, DocumentCollection, SenseTable};

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Overrides every query's limit.
	#[arg(long, value_name = "N")]
	pub limit: Option<usize>,
	/// Truncate each ranked list at its largest score drop.
	#[arg(long)]
	pub score_gap: bool,
	/// Log the expansion and per-result score breakdown of every query.
	#[arg(long)]
	pub debug: bool,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	collection: DatasetCollection,
	#[serde(default)]
	concepts: HashMap<String, Vec<String>>,
	#[serde(default)]
	lexicon: HashMap<String, Vec<SynsetCandidate>>,
	/// Query text to embedding. When absent, queries are embedded with the configured provider.
	query_embeddings: Option<HashMap<String, Vec<f32>>>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct DatasetCollection {
	name: String,
	kind: CollectionKind,
	documents: Vec<DatasetDocument>,
}

#[derive(Debug, Deserialize)]
struct DatasetDocument {
	id: String,
	#[serde(default)]
	title_path: String,
	#[serde(default)]
	text: String,
	#[serde(default)]
	concepts: Vec<String>,
	embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	limit: Option<usize>,
	expected_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	prewarm: PrewarmReport,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	collection: String,
	kind: CollectionKind,
	document_count: usize,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	embedding: &'static str,
	synset_strategy: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	limit: Option<usize>,
	score_gap: bool,
	debug: bool,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	limit: usize,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	expected_ids: Vec<String>,
	retrieved_ids: Vec<String>,
	top_score: Option<f64>,
}

#[derive(Debug, PartialEq)]
struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sieve_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let output = eval_dataset(&args, config, dataset).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}
	if dataset.collection.documents.is_empty() {
		return Err(eyre::eyre!("Dataset collection must include at least one document."));
	}

	Ok(dataset)
}

fn build_embedding(
	config: &Config,
	dataset: &EvalDataset,
) -> color_eyre::Result<(Arc<dyn EmbeddingProvider>, &'static str)> {
	if let Some(vectors) = dataset.query_embeddings.as_ref() {
		let embedding: Arc<dyn EmbeddingProvider> =
			Arc::new(DatasetEmbedding::new(vectors.clone()));

		return Ok((embedding, "dataset"));
	}

	let embedding: Arc<dyn EmbeddingProvider> =
		Arc::new(HttpEmbedder::new(&config.providers.embedding)?);

	Ok((embedding, "http"))
}

fn build_collection(dataset: &DatasetCollection) -> DocumentCollection {
	let mut collection = DocumentCollection::new(&dataset.name, dataset.kind);

	for document in &dataset.documents {
		let row = CandidateRow {
			id: document.id.clone(),
			text: document.text.clone(),
			title_path: document.title_path.clone(),
			concepts: document.concepts.clone(),
			distance: None,
		};

		collection.push(row, document.embedding.clone());
	}

	collection
}

async fn eval_dataset(
	args: &Args,
	config: Config,
	dataset: EvalDataset,
) -> color_eyre::Result<EvalOutput> {
	let (embedding, embedding_source) = build_embedding(&config, &dataset)?;
	let concepts = Arc::new(ConceptGraph::new(dataset.concepts.clone()));
	let lexicon = Arc::new(CachedLexicon::new(SenseTable::new(dataset.lexicon.clone())));
	let providers = Providers::new(embedding, concepts, lexicon);
	let mut search = HybridSearch::new(&config, providers)?;

	if config.cache.enabled {
		search = search.with_cache(Arc::new(MemoryResultCache::from_config(&config.cache)));
	}

	let collection = build_collection(&dataset.collection);
	let query_terms: Vec<String> =
		dataset.queries.iter().flat_map(|query| terms::normalize_terms(&query.query)).collect();
	let prewarm = search.prewarm_lexicon(&query_terms).await?;
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let limit = args.limit.or(query.limit).unwrap_or(DEFAULT_LIMIT).max(1);
		let started = Instant::now();
		let results = run_query(&search, &collection, &query.query, limit, args, &config).await?;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let retrieved = unique_ids(results.iter().map(|result| result.row.id.as_str()));
		let expected: HashSet<&str> = query.expected_ids.iter().map(String::as_str).collect();
		let metrics = compute_metrics(&retrieved, &expected);

		tracing::debug!(
			query = query.query.as_str(),
			retrieved = retrieved.len(),
			recall_at_k = metrics.recall_at_k,
			latency_ms,
			"Query evaluated."
		);

		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", index + 1)),
			query: query.query.clone(),
			limit,
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			ndcg: metrics.ndcg,
			latency_ms,
			expected_ids: query.expected_ids.clone(),
			retrieved_ids: retrieved.iter().map(|id| id.to_string()).collect(),
			top_score: results.first().map(|result| result.hybrid_score),
		});

		latencies_ms.push(latency_ms);
	}

	let summary = summarize(&reports, &latencies_ms);

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			collection: dataset.collection.name.clone(),
			kind: dataset.collection.kind,
			document_count: collection.len(),
			query_count: reports.len(),
		},
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			embedding: embedding_source,
			synset_strategy: config.expansion.synset_strategy.clone(),
			limit: args.limit,
			score_gap: args.score_gap,
			debug: args.debug,
		},
		prewarm,
		summary,
		queries: reports,
	})
}

async fn run_query(
	search: &HybridSearch,
	collection: &DocumentCollection,
	query: &str,
	limit: usize,
	args: &Args,
	config: &Config,
) -> color_eyre::Result<Vec<ScoredResult>> {
	if args.debug {
		let results = search.search(collection, query, limit, true).await?;

		if args.score_gap {
			return Ok(score_gap::filter_by_score_gap(
				results,
				config.search.score_gap_min,
				|result| result.hybrid_score,
			));
		}

		return Ok(results);
	}
	if args.score_gap {
		return Ok(search.search_with_score_gap(collection, query, limit).await?);
	}

	Ok(search.search(collection, query, limit, false).await?)
}

fn unique_ids<'a, I>(iter: I) -> Vec<&'a str>
where
	I: Iterator<Item = &'a str>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for id in iter {
		if seen.insert(id) {
			out.push(id);
		}
	}

	out
}

fn compute_metrics(retrieved: &[&str], expected: &HashSet<&str>) -> Metrics {
	let expected_count = expected.len();
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if !expected.contains(id) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();

		if first_hit.is_none() {
			first_hit = Some(rank);
		}
	}

	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let ideal_hits = expected_count.min(retrieved.len());
	let idcg: f64 = (1..=ideal_hits).map(|rank| 1.0 / (rank as f64 + 1.0).log2()).sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let avg_recall_at_k = reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count;
	let avg_precision_at_k = reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count;
	let mean_rr = reports.iter().map(|r| r.rr).sum::<f64>() / count;
	let mean_ndcg = reports.iter().map(|r| r.ndcg).sum::<f64>() / count;
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(f64::total_cmp);

	EvalSummary {
		avg_recall_at_k,
		avg_precision_at_k,
		mean_rr,
		mean_ndcg,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
