use std::cmp::Ordering;

use sieve_domain::{CollectionKind, ExpandedQuery, ScoreComponents, WeightProfile, scoring};

use crate::{
	Error, Result,
	search::{CandidateRow, ScoredResult},
};

/// Validated baseline profiles for every collection kind.
#[derive(Clone, Copy, Debug)]
pub struct BaselineProfiles {
	summary: WeightProfile,
	chunk: WeightProfile,
	concept: WeightProfile,
}
impl BaselineProfiles {
	pub fn from_config(profiles: &sieve_config::SearchProfiles) -> Result<Self> {
		let build = |kind: CollectionKind| {
			WeightProfile::from_config(kind.baseline(profiles)).map_err(|err| Error::Config {
				message: format!("search.profiles.{}: {err}", kind.as_str()),
			})
		};

		Ok(Self {
			summary: build(CollectionKind::Summary)?,
			chunk: build(CollectionKind::Chunk)?,
			concept: build(CollectionKind::Concept)?,
		})
	}

	pub fn get(&self, kind: CollectionKind) -> WeightProfile {
		match kind {
			CollectionKind::Summary => self.summary,
			CollectionKind::Chunk => self.chunk,
			CollectionKind::Concept => self.concept,
		}
	}
}

#[derive(Clone, Copy, Debug)]
pub struct ScoringLimits {
	pub max_matched_concepts: usize,
	pub max_expanded_terms: usize,
}

pub fn validate_row(row: &CandidateRow) -> Result<()> {
	if row.text.trim().is_empty() && row.title_path.trim().is_empty() {
		return Err(Error::Precondition {
			message: format!("Candidate row {} has neither text nor title path.", row.id),
		});
	}
	if let Some(distance) = row.distance
		&& !distance.is_finite()
	{
		return Err(Error::Precondition {
			message: format!("Candidate row {} has a non-finite distance.", row.id),
		});
	}

	Ok(())
}

pub fn score_row(
	row: CandidateRow,
	expanded: &ExpandedQuery,
	profile: &WeightProfile,
	limits: ScoringLimits,
) -> Result<ScoredResult> {
	validate_row(&row)?;

	let components = ScoreComponents {
		vector: scoring::vector_score(row.distance),
		bm25: scoring::bm25_score(
			expanded.all_terms(),
			expanded.weights(),
			&row.text,
			&row.title_path,
		),
		title: scoring::title_score(expanded.original_terms(), &row.title_path),
		concept: scoring::concept_score(expanded, &row.concepts),
		wordnet: scoring::wordnet_score(expanded.wordnet_terms(), &row.text),
	};
	let hybrid_score = scoring::hybrid_score(&components, profile);
	let matched_concepts =
		scoring::matched_concepts(expanded, &row.concepts, limits.max_matched_concepts);
	let expanded_terms =
		expanded.all_terms().iter().take(limits.max_expanded_terms).cloned().collect();

	Ok(ScoredResult { row, components, hybrid_score, matched_concepts, expanded_terms })
}

/// Stable sort by descending hybrid score; equal scores keep their vector-search order.
pub fn sort_by_score(results: &mut [ScoredResult]) {
	results.sort_by(|a, b| cmp_desc(a.hybrid_score, b.hybrid_score));
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
	b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(id: &str, text: &str, title_path: &str, distance: Option<f64>) -> CandidateRow {
		CandidateRow {
			id: id.to_string(),
			text: text.to_string(),
			title_path: title_path.to_string(),
			concepts: Vec::new(),
			distance,
		}
	}

	fn limits() -> ScoringLimits {
		ScoringLimits { max_matched_concepts: 5, max_expanded_terms: 10 }
	}

	#[test]
	fn rows_without_text_or_title_are_rejected() {
		let err = validate_row(&row("a", " ", "", Some(0.1))).expect_err("Expected rejection.");

		assert!(matches!(err, Error::Precondition { .. }));
		assert!(validate_row(&row("b", "", "/docs/b.md", Some(0.1))).is_ok());
	}

	#[test]
	fn non_finite_distances_are_rejected() {
		assert!(validate_row(&row("a", "text", "", Some(f64::NAN))).is_err());
		assert!(validate_row(&row("a", "text", "", Some(f64::INFINITY))).is_err());
		assert!(validate_row(&row("a", "text", "", None)).is_ok());
	}

	#[test]
	fn scored_rows_carry_capped_expanded_terms() {
		let terms: Vec<String> = (0..15).map(|idx| format!("term{idx:02}")).collect();
		let expanded = ExpandedQuery::unexpanded(terms);
		let profile = WeightProfile::new(0.30, 0.25, 0.20, 0.15, 0.10).expect("Valid profile.");
		let candidate = row("a", "term00 text", "/a.md", Some(0.2));
		let scored =
			score_row(candidate, &expanded, &profile, limits()).expect("Row must score.");

		assert_eq!(scored.expanded_terms.len(), 10);
		assert!((scored.components.vector - 0.8).abs() < 1e-12);
		assert!((0.0..=1.0).contains(&scored.hybrid_score));
	}

	#[test]
	fn sort_is_descending_and_stable() {
		let expanded = ExpandedQuery::unexpanded(vec!["rust".to_string()]);
		let profile = WeightProfile::new(1.0, 0.0, 0.0, 0.0, 0.0).expect("Valid profile.");
		let mut results: Vec<ScoredResult> = [("a", 0.5), ("b", 0.1), ("c", 0.5)]
			.into_iter()
			.map(|(id, distance)| {
				score_row(row(id, "text", "", Some(distance)), &expanded, &profile, limits())
					.expect("Row must score.")
			})
			.collect();

		sort_by_score(&mut results);

		let ids: Vec<&str> = results.iter().map(|result| result.row.id.as_str()).collect();

		assert_eq!(ids, vec!["b", "a", "c"]);
	}
}
