pub mod query;
pub mod score_gap;
pub mod scoring;
pub mod synset;
pub mod terms;

mod error;

pub use error::{Error, Result};
pub use query::{ExpandedQuery, ExpansionWeights};
pub use scoring::{CollectionKind, ScoreComponents, WeightProfile};
pub use synset::{ContextAware, FirstSense, SelectionContext, SynsetCandidate, SynsetSelector};
