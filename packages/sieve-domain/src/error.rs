pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Synset selection requires at least one candidate.")]
	EmptyCandidates,
	#[error("Invalid weight profile: {message}")]
	InvalidProfile { message: String },
}
