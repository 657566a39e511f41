use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub expansion: Expansion,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub cache: Cache,
	pub resilience: Option<Resilience>,
	#[serde(default)]
	pub lexicon: Lexicon,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Expansion {
	/// Related corpus concepts kept per original term.
	pub max_corpus_terms: u32,
	/// Lexical lemmas kept per original term.
	pub max_lexical_terms: u32,
	pub corpus_weight: f64,
	pub lexical_weight: f64,
	/// Also collect narrower lemmas from the selected sense.
	pub include_narrower: bool,
	/// One of "first_sense" or "context_aware".
	pub synset_strategy: String,
	pub domain_hints: Vec<String>,
	pub technical_indicators: Vec<String>,
}
impl Default for Expansion {
	fn default() -> Self {
		Self {
			max_corpus_terms: 5,
			max_lexical_terms: 5,
			corpus_weight: 0.8,
			lexical_weight: 0.6,
			include_narrower: false,
			synset_strategy: "first_sense".to_string(),
			domain_hints: Vec::new(),
			technical_indicators: default_technical_indicators(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Candidates fetched per requested result before re-ranking.
	pub overfetch_factor: u32,
	pub max_matched_concepts: u32,
	pub max_expanded_terms: u32,
	pub score_gap_min: f64,
	pub profiles: SearchProfiles,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			overfetch_factor: 3,
			max_matched_concepts: 5,
			max_expanded_terms: 10,
			score_gap_min: 0.01,
			profiles: SearchProfiles::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchProfiles {
	pub summary: ProfileWeights,
	pub chunk: ProfileWeights,
	pub concept: ProfileWeights,
}
impl Default for SearchProfiles {
	fn default() -> Self {
		Self {
			summary: ProfileWeights {
				vector: 0.30,
				bm25: 0.25,
				title: 0.20,
				concept: 0.15,
				wordnet: 0.10,
			},
			chunk: ProfileWeights {
				vector: 0.35,
				bm25: 0.30,
				title: 0.10,
				concept: 0.15,
				wordnet: 0.10,
			},
			concept: ProfileWeights {
				vector: 0.40,
				bm25: 0.20,
				title: 0.00,
				concept: 0.30,
				wordnet: 0.10,
			},
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct ProfileWeights {
	pub vector: f64,
	pub bm25: f64,
	pub title: f64,
	pub concept: f64,
	pub wordnet: f64,
}
impl ProfileWeights {
	pub fn sum(&self) -> f64 {
		self.vector + self.bm25 + self.title + self.concept + self.wordnet
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: u32,
	pub ttl_secs: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 1_024, ttl_secs: 300 }
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct Resilience {
	#[serde(default = "default_resilience_name")]
	pub name: String,
	pub timeout_ms: u64,
	pub max_concurrent: u32,
	pub max_queue_depth: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Lexicon {
	pub prewarm_concurrency: u32,
}
impl Default for Lexicon {
	fn default() -> Self {
		Self { prewarm_concurrency: 4 }
	}
}

pub fn default_technical_indicators() -> Vec<String> {
	[
		"algorithm",
		"computer",
		"computing",
		"data",
		"digital",
		"electronic",
		"engineering",
		"information",
		"network",
		"program",
		"programming",
		"software",
		"system",
		"technical",
		"technology",
	]
	.into_iter()
	.map(str::to_string)
	.collect()
}

fn default_resilience_name() -> String {
	"hybrid_search".to_string()
}
