//! Client for asynchronous document layout analysis that renders a note as markdown.
//!
//! The service accepts the document, answers with an `Operation-Location` header, and is polled
//! until the operation settles.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Error, Result};

const OPERATION_LOCATION: &str = "operation-location";

pub async fn analyze(cfg: &clinote_config::LayoutProviderConfig, content: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let headers =
		crate::auth_headers(&cfg.api_key, cfg.api_key_header.as_deref(), &cfg.default_headers)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "base64Source": STANDARD.encode(content.as_bytes()) });
	let res = client
		.post(url)
		.query(&[("api-version", cfg.api_version.as_str()), ("outputContentFormat", "markdown")])
		.headers(headers.clone())
		.json(&body)
		.send()
		.await?
		.error_for_status()?;
	let operation = operation_location(res.headers())?;

	tracing::debug!(operation = %operation, "Layout analysis accepted.");

	for attempt in 1..=cfg.max_polls {
		tokio::time::sleep(Duration::from_millis(cfg.poll_interval_ms)).await;

		let json: Value = client
			.get(operation.as_str())
			.headers(headers.clone())
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;

		if let Some(markdown) = parse_operation(&json)? {
			tracing::debug!(attempt, chars = markdown.len(), "Layout analysis succeeded.");

			return Ok(markdown);
		}
	}

	Err(Error::InvalidResponse {
		message: format!("Layout analysis did not finish after {} polls.", cfg.max_polls),
	})
}

fn operation_location(headers: &HeaderMap) -> Result<String> {
	headers
		.get(OPERATION_LOCATION)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Layout response is missing the Operation-Location header.".to_string(),
		})
}

/// `Ok(None)` while the operation is still running.
fn parse_operation(json: &Value) -> Result<Option<String>> {
	match json.get("status").and_then(Value::as_str) {
		Some("succeeded") => json
			.pointer("/analyzeResult/content")
			.and_then(Value::as_str)
			.map(|content| Some(content.to_string()))
			.ok_or_else(|| Error::InvalidResponse {
				message: "Layout result is missing analyzeResult.content.".to_string(),
			}),
		Some("notStarted" | "running") => Ok(None),
		Some("failed") => {
			let detail = json
				.pointer("/error/message")
				.and_then(Value::as_str)
				.unwrap_or("no error detail");

			Err(Error::InvalidResponse { message: format!("Layout analysis failed: {detail}") })
		},
		other => Err(Error::InvalidResponse {
			message: format!("Layout analysis returned unexpected status {other:?}."),
		}),
	}
}
