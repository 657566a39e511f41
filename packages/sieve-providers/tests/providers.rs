use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use sieve_config::EmbeddingProviderConfig;
use sieve_providers::{Error, embedding::HttpEmbedder};

fn embedding_config(api_base: &str) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "local".to_string(),
		api_base: api_base.to_string(),
		api_key: "secret".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "mini-embed".to_string(),
		dimensions: 4,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		sieve_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut default_headers = Map::new();

	default_headers.insert("x-retries".to_string(), Value::from(3));

	let err = sieve_providers::auth_headers("secret", &default_headers)
		.expect_err("Expected header validation error.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn embedder_requires_api_base() {
	let result = HttpEmbedder::new(&embedding_config("  "));

	assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[test]
fn embedder_builds_from_valid_config() {
	assert!(HttpEmbedder::new(&embedding_config("http://127.0.0.1:9")).is_ok());
}
