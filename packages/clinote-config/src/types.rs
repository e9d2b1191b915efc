use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub layout: LayoutProviderConfig,
	/// Required when `retrieval.semantic_rerank` is enabled.
	pub rerank: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	/// Header carrying the key. `None` sends `Authorization: Bearer <key>`.
	pub api_key_header: Option<String>,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub api_key_header: Option<String>,
	#[serde(default = "default_layout_path")]
	pub path: String,
	#[serde(default = "default_layout_api_version")]
	pub api_version: String,
	pub timeout_ms: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_max_polls")]
	pub max_polls: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub api_key_header: Option<String>,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunking {
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_overlap_percent")]
	pub overlap_percent: f32,
	/// Hugging Face repository of the tokenizer. Falls back to the embedding model.
	pub tokenizer_repo: Option<String>,
}
impl Chunking {
	/// Overlap in tokens, rounded half away from zero.
	pub fn overlap_tokens(&self) -> u32 {
		(self.overlap_percent * self.max_tokens as f32).round() as u32
	}
}
impl Default for Chunking {
	fn default() -> Self {
		Self {
			max_tokens: default_max_tokens(),
			overlap_percent: default_overlap_percent(),
			tokenizer_repo: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub semantic_rerank: bool,
	#[serde(default)]
	pub threshold_scan: ThresholdScan,
	#[serde(default = "default_max_pages")]
	pub max_pages: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			page_size: default_page_size(),
			top_k: default_top_k(),
			fusion: Fusion::default(),
			semantic_rerank: false,
			threshold_scan: ThresholdScan::default(),
			max_pages: default_max_pages(),
		}
	}
}

/// How relevance queries gather candidates. Returned scores are absolute hybrid scores either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fusion {
	/// Reciprocal rank fusion.
	#[default]
	Rrf,
	/// Distribution-based score fusion.
	Dbsf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScan {
	/// Scan every hit of every page and keep those above the threshold.
	#[default]
	Exhaustive,
	/// Stop at the first hit at or below the threshold. Pages are key ordered, so this can miss
	/// qualifying hits that come later.
	StopAtFirstMiss,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Worker {
	#[serde(default = "default_concurrency")]
	pub concurrency: u32,
}
impl Default for Worker {
	fn default() -> Self {
		Self { concurrency: default_concurrency() }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_layout_path() -> String {
	"/documentintelligence/documentModels/prebuilt-layout:analyze".to_string()
}

fn default_layout_api_version() -> String {
	"2024-11-30".to_string()
}

fn default_poll_interval_ms() -> u64 {
	1_000
}

fn default_max_polls() -> u32 {
	120
}

fn default_max_tokens() -> u32 {
	512
}

fn default_overlap_percent() -> f32 {
	0.25
}

fn default_page_size() -> u32 {
	1_000
}

fn default_top_k() -> u32 {
	5
}

fn default_max_pages() -> u32 {
	1_000
}

fn default_concurrency() -> u32 {
	4
}
