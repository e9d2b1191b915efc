pub mod memory;
pub mod qdrant;

mod error;

pub use clinote_config::Fusion;
pub use error::{Error, Result};

use std::{future::Future, pin::Pin};

use clinote_domain::{DocumentKey, IndexedDocument, StoredDocument};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote store of chunk documents supporting hybrid lexical and vector queries.
///
/// Batch writes report per-item outcomes. An `Err` means the whole call failed.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	/// Inserts or merges documents by id.
	fn upsert<'a>(&'a self, docs: &'a [IndexedDocument]) -> BoxFuture<'a, Result<BatchReport>>;

	fn delete<'a>(&'a self, document_ids: &'a [String]) -> BoxFuture<'a, Result<BatchReport>>;

	/// Ids of every document stored for `record_id`, in no particular order.
	fn document_ids_for_record(&self, record_id: i64) -> BoxFuture<'_, Result<Vec<String>>>;

	fn query<'a>(&'a self, query: &'a HybridQuery) -> BoxFuture<'a, Result<QueryPage>>;

	/// Documents with the given ids. Unknown ids are absent from the result.
	fn fetch<'a>(&'a self, document_ids: &'a [String])
	-> BoxFuture<'a, Result<Vec<StoredDocument>>>;
}

#[derive(Clone, Debug)]
pub struct HybridQuery {
	pub text: String,
	pub vector: Vec<f32>,
	pub top: u32,
	pub order: QueryOrder,
	pub projection: Projection,
	pub fusion: Fusion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOrder {
	/// Best score first.
	Relevance,
	/// Ascending `(record_id, chunk_order)`, strictly after `after` when set.
	Key { after: Option<DocumentKey> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
	/// Key and descriptive fields only.
	Minimal,
	/// Everything including chunk text.
	Full,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
	pub score: f32,
	pub document: StoredDocument,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryPage {
	pub hits: Vec<SearchHit>,
	/// Number of documents the query ranges over, ignoring `top` and any key cursor.
	pub total_count: u64,
}

/// Absolute hybrid score from a dense similarity and a lexical share in `[0, 1]`.
///
/// Every [`SearchIndex`] scores a document from the query and that document alone, so a score
/// never depends on which other documents share a page.
pub fn hybrid_score(dense: f32, lexical: f32) -> f32 {
	0.5 * dense.clamp(0.0, 1.0) + 0.5 * lexical.clamp(0.0, 1.0)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemStatus {
	pub document_id: String,
	/// `None` on success.
	pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub items: Vec<ItemStatus>,
}
impl BatchReport {
	pub fn all_succeeded<I>(document_ids: I) -> Self
	where
		I: IntoIterator<Item = String>,
	{
		Self {
			items: document_ids
				.into_iter()
				.map(|document_id| ItemStatus { document_id, error: None })
				.collect(),
		}
	}

	pub fn succeeded(&self) -> usize {
		self.items.iter().filter(|item| item.error.is_none()).count()
	}

	pub fn failures(&self) -> impl Iterator<Item = &ItemStatus> {
		self.items.iter().filter(|item| item.error.is_some())
	}
}
