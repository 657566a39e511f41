//! Dataset-backed collaborators for offline evaluation.

use std::collections::HashMap;

use sieve_domain::{CollectionKind, SynsetCandidate};
use sieve_service::{
	BoxFuture, CandidateRow, ConceptLookup, EmbeddingProvider, Error, LexicalLookup, Result,
	VectorCollection,
};

/// Precomputed query embeddings keyed by exact query text.
pub struct DatasetEmbedding {
	vectors: HashMap<String, Vec<f32>>,
}
impl DatasetEmbedding {
	pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
		Self { vectors }
	}
}
impl EmbeddingProvider for DatasetEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			self.vectors.get(text).cloned().ok_or_else(|| Error::Provider {
				message: format!("Dataset has no embedding for query {text:?}."),
			})
		})
	}
}

/// Term to related-concept map, keyed by lowercase term.
pub struct ConceptGraph {
	related: HashMap<String, Vec<String>>,
}
impl ConceptGraph {
	pub fn new(related: HashMap<String, Vec<String>>) -> Self {
		let related =
			related.into_iter().map(|(term, values)| (term.to_lowercase(), values)).collect();

		Self { related }
	}
}
impl ConceptLookup for ConceptGraph {
	fn related_terms<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			Ok(self.related.get(&term.to_lowercase()).cloned().unwrap_or_default())
		})
	}
}

/// Term to sense list map, keyed by lowercase term.
pub struct SenseTable {
	senses: HashMap<String, Vec<SynsetCandidate>>,
}
impl SenseTable {
	pub fn new(senses: HashMap<String, Vec<SynsetCandidate>>) -> Self {
		let senses =
			senses.into_iter().map(|(term, values)| (term.to_lowercase(), values)).collect();

		Self { senses }
	}
}
impl LexicalLookup for SenseTable {
	fn senses<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<SynsetCandidate>>> {
		Box::pin(async move {
			Ok(self.senses.get(&term.to_lowercase()).cloned().unwrap_or_default())
		})
	}
}

/// Brute-force collection ranked by cosine distance.
pub struct DocumentCollection {
	name: String,
	kind: CollectionKind,
	rows: Vec<(CandidateRow, Vec<f32>)>,
}
impl DocumentCollection {
	pub fn new(name: &str, kind: CollectionKind) -> Self {
		Self { name: name.to_string(), kind, rows: Vec::new() }
	}

	pub fn push(&mut self, row: CandidateRow, embedding: Vec<f32>) {
		self.rows.push((row, embedding));
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}
}
impl VectorCollection for DocumentCollection {
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

/// `1 - cosine similarity`; 1.0 for empty, zero-length or mismatched vectors.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
	if a.len() != b.len() || a.is_empty() {
		return 1.0;
	}

	let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (f64::from(*x), f64::from(*y));

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
