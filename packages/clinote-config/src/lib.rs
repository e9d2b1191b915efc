mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, Fusion, LayoutProviderConfig, ProviderConfig,
	Providers, Qdrant, Retrieval, Service, Storage, ThresholdScan, Worker,
};

use std::{fs, path::Path};

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
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.layout.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "providers.layout.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.layout.max_polls == 0 {
		return Err(Error::Validation {
			message: "providers.layout.max_polls must be greater than zero.".to_string(),
		});
	}

	let mut keys = vec![
		("embedding", &cfg.providers.embedding.api_key),
		("layout", &cfg.providers.layout.api_key),
	];

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		keys.push(("rerank", &rerank.api_key));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.chunking.max_tokens == 0 {
		return Err(Error::Validation {
			message: "chunking.max_tokens must be greater than zero.".to_string(),
		});
	}
	if !cfg.chunking.overlap_percent.is_finite() {
		return Err(Error::Validation {
			message: "chunking.overlap_percent must be a finite number.".to_string(),
		});
	}
	if !(0.0..1.0).contains(&cfg.chunking.overlap_percent) {
		return Err(Error::Validation {
			message: "chunking.overlap_percent must be in the range 0.0 (inclusive) to 1.0 (exclusive)."
				.to_string(),
		});
	}
	if cfg.chunking.overlap_tokens() >= cfg.chunking.max_tokens {
		return Err(Error::Validation {
			message: "chunking.overlap_percent must leave fewer overlap tokens than chunking.max_tokens."
				.to_string(),
		});
	}
	if cfg.retrieval.page_size == 0 {
		return Err(Error::Validation {
			message: "retrieval.page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_pages == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_pages must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.semantic_rerank && cfg.providers.rerank.is_none() {
		return Err(Error::Validation {
			message: "retrieval.semantic_rerank requires [providers.rerank].".to_string(),
		});
	}
	if cfg.worker.concurrency == 0 {
		return Err(Error::Validation {
			message: "worker.concurrency must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.chunking.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.chunking.tokenizer_repo = None;
	}
	if cfg
		.providers
		.embedding
		.api_key_header
		.as_deref()
		.map(|header| header.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.embedding.api_key_header = None;
	}
	if cfg
		.providers
		.layout
		.api_key_header
		.as_deref()
		.map(|header| header.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.layout.api_key_header = None;
	}
	if let Some(rerank) = cfg.providers.rerank.as_mut()
		&& rerank.api_key_header.as_deref().map(|header| header.trim().is_empty()).unwrap_or(false)
	{
		rerank.api_key_header = None;
	}
}
