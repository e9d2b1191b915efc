pub mod embedding;
pub mod layout;
pub mod rerank;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

/// Builds request headers. The key goes into `api_key_header` when set, otherwise into a bearer
/// `Authorization` header.
pub fn auth_headers(
	api_key: &str,
	api_key_header: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	match api_key_header {
		Some(name) => {
			headers.insert(HeaderName::from_bytes(name.as_bytes())?, api_key.parse()?);
		},
		None => {
			headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
		},
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
