use reqwest::header::AUTHORIZATION;
use serde_json::Map;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_partial_json, header, method, path, query_param},
};

use clinote_config::{EmbeddingProviderConfig, LayoutProviderConfig, ProviderConfig};

fn layout_config(api_base: String) -> LayoutProviderConfig {
	LayoutProviderConfig {
		api_base,
		api_key: "layout-key".to_string(),
		api_key_header: Some("Ocp-Apim-Subscription-Key".to_string()),
		path: "/layout:analyze".to_string(),
		api_version: "2024-11-30".to_string(),
		timeout_ms: 5_000,
		poll_interval_ms: 1,
		max_polls: 3,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers = clinote_providers::auth_headers("secret", None, &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn builds_named_key_header() {
	let headers = clinote_providers::auth_headers("secret", Some("api-key"), &Map::new())
		.expect("Failed to build headers.");

	assert_eq!(headers.get("api-key").expect("Missing key header."), "secret");
	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), serde_json::json!(3));

	assert!(clinote_providers::auth_headers("secret", None, &defaults).is_err());
}

#[tokio::test]
async fn layout_polls_until_markdown_is_ready() {
	let server = MockServer::start().await;
	let operation = format!("{}/operations/1", server.uri());

	Mock::given(method("POST"))
		.and(path("/layout:analyze"))
		.and(query_param("outputContentFormat", "markdown"))
		.and(header("Ocp-Apim-Subscription-Key", "layout-key"))
		// base64 of "Patient stable."
		.and(body_partial_json(serde_json::json!({ "base64Source": "UGF0aWVudCBzdGFibGUu" })))
		.respond_with(ResponseTemplate::new(202).insert_header("Operation-Location", operation.as_str()))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/operations/1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"status": "running"
		})))
		.up_to_n_times(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/operations/1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"status": "succeeded",
			"analyzeResult": { "content": "# Note\n\nPatient stable." }
		})))
		.mount(&server)
		.await;

	let markdown = clinote_providers::layout::analyze(&layout_config(server.uri()), "Patient stable.")
		.await
		.expect("Layout analysis failed.");

	assert_eq!(markdown, "# Note\n\nPatient stable.");
}

#[tokio::test]
async fn layout_gives_up_after_max_polls() {
	let server = MockServer::start().await;
	let operation = format!("{}/operations/2", server.uri());

	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(202).insert_header("Operation-Location", operation.as_str()))
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"status": "running"
		})))
		.expect(3)
		.mount(&server)
		.await;

	let err = clinote_providers::layout::analyze(&layout_config(server.uri()), "text")
		.await
		.expect_err("Layout analysis must time out.");

	assert_eq!(err.to_string(), "Layout analysis did not finish after 3 polls.");
}

#[tokio::test]
async fn layout_surfaces_http_errors() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500))
		.mount(&server)
		.await;

	let result = clinote_providers::layout::analyze(&layout_config(server.uri()), "text").await;

	assert!(matches!(result, Err(clinote_providers::Error::Reqwest(_))));
}

#[tokio::test]
async fn embedding_posts_model_and_dimensions() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/embeddings"))
		.and(header("authorization", "Bearer embed-key"))
		.and(body_partial_json(serde_json::json!({ "model": "m", "dimensions": 2 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"data": [{ "index": 0, "embedding": [0.25, 0.75] }]
		})))
		.expect(1)
		.mount(&server)
		.await;

	let cfg = EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: server.uri(),
		api_key: "embed-key".to_string(),
		api_key_header: None,
		path: "/v1/embeddings".to_string(),
		model: "m".to_string(),
		dimensions: 2,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	};
	let vectors = clinote_providers::embedding::embed(&cfg, &["chunk".to_string()])
		.await
		.expect("Embedding failed.");

	assert_eq!(vectors, vec![vec![0.25, 0.75]]);
}

#[tokio::test]
async fn rerank_aligns_scores_with_documents() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/rerank"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.8 },
				{ "index": 0, "relevance_score": 0.1 }
			]
		})))
		.mount(&server)
		.await;

	let cfg = ProviderConfig {
		provider_id: "test".to_string(),
		api_base: server.uri(),
		api_key: "rerank-key".to_string(),
		api_key_header: None,
		path: "/v1/rerank".to_string(),
		model: "r".to_string(),
		timeout_ms: 5_000,
		default_headers: Map::new(),
	};
	let scores = clinote_providers::rerank::rerank(&cfg, "q", &["a".to_string(), "b".to_string()])
		.await
		.expect("Rerank failed.");

	assert_eq!(scores, vec![0.1, 0.8]);
}
