mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, Expansion, Lexicon, ProfileWeights, Providers,
	Resilience, Search, SearchProfiles, Service, default_technical_indicators,
};

use std::{fs, path::Path};

pub const SYNSET_STRATEGIES: [&str; 2] = ["first_sense", "context_aware"];

/// Upper bound on concept names reported per search result.
pub const MAX_MATCHED_CONCEPTS: u32 = 5;
/// Upper bound on expanded terms reported per search result.
pub const MAX_EXPANDED_TERMS: u32 = 10;

const PROFILE_SUM_TOLERANCE: f64 = 1e-6;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	validate_expansion(cfg)?;
	validate_search(cfg)?;

	if cfg.cache.enabled && cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero when enabled.".to_string(),
		});
	}

	if let Some(resilience) = cfg.resilience.as_ref() {
		if resilience.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "resilience.name must be non-empty.".to_string(),
			});
		}

		for (label, value) in [
			("resilience.timeout_ms", resilience.timeout_ms),
			("resilience.max_concurrent", u64::from(resilience.max_concurrent)),
			("resilience.max_queue_depth", u64::from(resilience.max_queue_depth)),
		] {
			if value == 0 {
				return Err(Error::Validation {
					message: format!("{label} must be greater than zero."),
				});
			}
		}
	}

	if cfg.lexicon.prewarm_concurrency == 0 {
		return Err(Error::Validation {
			message: "lexicon.prewarm_concurrency must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_expansion(cfg: &Config) -> Result<()> {
	let expansion = &cfg.expansion;

	if !SYNSET_STRATEGIES.contains(&expansion.synset_strategy.as_str()) {
		return Err(Error::Validation {
			message: "expansion.synset_strategy must be one of first_sense or context_aware."
				.to_string(),
		});
	}

	for (label, weight) in [
		("expansion.corpus_weight", expansion.corpus_weight),
		("expansion.lexical_weight", expansion.lexical_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	Ok(())
}

fn validate_search(cfg: &Config) -> Result<()> {
	let search = &cfg.search;

	if search.overfetch_factor == 0 {
		return Err(Error::Validation {
			message: "search.overfetch_factor must be greater than zero.".to_string(),
		});
	}
	if !(1..=MAX_MATCHED_CONCEPTS).contains(&search.max_matched_concepts) {
		return Err(Error::Validation {
			message: format!(
				"search.max_matched_concepts must be in the range 1-{MAX_MATCHED_CONCEPTS}."
			),
		});
	}
	if !(1..=MAX_EXPANDED_TERMS).contains(&search.max_expanded_terms) {
		return Err(Error::Validation {
			message: format!(
				"search.max_expanded_terms must be in the range 1-{MAX_EXPANDED_TERMS}."
			),
		});
	}
	if !search.score_gap_min.is_finite() {
		return Err(Error::Validation {
			message: "search.score_gap_min must be a finite number.".to_string(),
		});
	}
	if search.score_gap_min < 0.0 {
		return Err(Error::Validation {
			message: "search.score_gap_min must be zero or greater.".to_string(),
		});
	}

	for (label, profile) in [
		("search.profiles.summary", &search.profiles.summary),
		("search.profiles.chunk", &search.profiles.chunk),
		("search.profiles.concept", &search.profiles.concept),
	] {
		validate_profile(label, profile)?;
	}

	Ok(())
}

fn validate_profile(label: &str, profile: &ProfileWeights) -> Result<()> {
	for (component, weight) in [
		("vector", profile.vector),
		("bm25", profile.bm25),
		("title", profile.title),
		("concept", profile.concept),
		("wordnet", profile.wordnet),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label}.{component} must be a finite number."),
			});
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label}.{component} must be in the range 0.0-1.0."),
			});
		}
	}

	if (profile.sum() - 1.0).abs() > PROFILE_SUM_TOLERANCE {
		return Err(Error::Validation { message: format!("{label} weights must sum to 1.0.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	normalize_terms(&mut cfg.expansion.domain_hints);
	normalize_terms(&mut cfg.expansion.technical_indicators);

	cfg.expansion.synset_strategy = cfg.expansion.synset_strategy.trim().to_lowercase();
}

fn normalize_terms(terms: &mut Vec<String>) {
	let mut out: Vec<String> = Vec::with_capacity(terms.len());

	for term in terms.drain(..) {
		let term = term.trim().to_lowercase();

		if term.is_empty() || out.contains(&term) {
			continue;
		}

		out.push(term);
	}

	*terms = out;
}
