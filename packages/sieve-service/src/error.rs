pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid configuration: {message}")]
	Config { message: String },
	#[error("Precondition violated: {message}")]
	Precondition { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Collection error: {message}")]
	Collection { message: String },
	#[error("Lookup error: {message}")]
	Lookup { message: String },
	#[error("Cache error: {message}")]
	Cache { message: String },
	#[error("Rejected: {message}")]
	Rejected { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
}
impl From<sieve_domain::Error> for Error {
	fn from(err: sieve_domain::Error) -> Self {
		match err {
			sieve_domain::Error::EmptyCandidates => Self::Precondition { message: err.to_string() },
			sieve_domain::Error::InvalidProfile { message } => Self::Config { message },
		}
	}
}

impl From<sieve_providers::Error> for Error {
	fn from(err: sieve_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
