pub mod chunking;
pub mod document;
pub mod retrieval;
pub mod sync;

mod error;

pub use clinote_storage::BoxFuture;
pub use error::{Error, Result};
pub use retrieval::select_top;
pub use sync::SyncReport;

use std::sync::Arc;

use clinote_chunking::TokenCounter;
use clinote_config::{Config, EmbeddingProviderConfig, LayoutProviderConfig, ProviderConfig};
use clinote_providers::{embedding, layout, rerank};
use clinote_storage::SearchIndex;

/// Renders raw note content as markdown.
pub trait LayoutProvider
where
	Self: Send + Sync,
{
	fn analyze<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// Scores documents against a query. The result is aligned with `docs`.
pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(&'a self, query: &'a str, docs: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub layout: Arc<dyn LayoutProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Option<Arc<dyn RerankProvider>>,
}
impl Providers {
	pub fn new(
		layout: Arc<dyn LayoutProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Option<Arc<dyn RerankProvider>>,
	) -> Self {
		Self { layout, embedding, rerank }
	}

	/// HTTP providers for the configured endpoints.
	pub fn from_config(cfg: &clinote_config::Providers) -> Self {
		Self {
			layout: Arc::new(HttpLayout(cfg.layout.clone())),
			embedding: Arc::new(HttpEmbedding(cfg.embedding.clone())),
			rerank: cfg
				.rerank
				.clone()
				.map(|rerank| Arc::new(HttpRerank(rerank)) as Arc<dyn RerankProvider>),
		}
	}
}

pub struct ClinoteService {
	pub cfg: Config,
	pub index: Arc<dyn SearchIndex>,
	pub counter: Arc<dyn TokenCounter>,
	pub providers: Providers,
}
impl ClinoteService {
	pub fn new(cfg: Config, index: Arc<dyn SearchIndex>, counter: Arc<dyn TokenCounter>) -> Self {
		let providers = Providers::from_config(&cfg.providers);

		Self { cfg, index, counter, providers }
	}

	pub fn with_providers(
		cfg: Config,
		index: Arc<dyn SearchIndex>,
		counter: Arc<dyn TokenCounter>,
		providers: Providers,
	) -> Self {
		Self { cfg, index, counter, providers }
	}
}

struct HttpLayout(LayoutProviderConfig);
impl LayoutProvider for HttpLayout {
	fn analyze<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			layout::analyze(&self.0, text)
				.await
				.map_err(|err| Error::Layout { message: err.to_string() })
		})
	}
}

struct HttpEmbedding(EmbeddingProviderConfig);
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			let mut vectors = embedding::embed(&self.0, &[text.to_string()])
				.await
				.map_err(|err| Error::Embedding { message: err.to_string() })?;

			vectors.pop().ok_or_else(|| Error::Embedding {
				message: "Embedding provider returned no vector.".to_string(),
			})
		})
	}
}

struct HttpRerank(ProviderConfig);
impl RerankProvider for HttpRerank {
	fn rerank<'a>(&'a self, query: &'a str, docs: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			rerank::rerank(&self.0, query, docs)
				.await
				.map_err(|err| Error::Rerank { message: err.to_string() })
		})
	}
}
