//! In-process [`SearchIndex`] for tests and local runs.
//!
//! Scoring is brute force: cosine similarity against stored vectors blended through
//! [`hybrid_score`] with the share of query terms found in the chunk text. Both fusion modes use
//! the same blend.

use std::{
	collections::{BTreeMap, HashSet},
	sync::RwLock,
};

use clinote_domain::{DocumentKey, IndexedDocument, StoredDocument};

use crate::{
	BatchReport, BoxFuture, HybridQuery, ItemStatus, Projection, QueryOrder, QueryPage, Result,
	SearchHit, SearchIndex, hybrid_score,
};

/// A write observed by the index, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
	Upsert(Vec<String>),
	Delete(Vec<String>),
}

#[derive(Default)]
pub struct MemoryIndex {
	docs: RwLock<BTreeMap<DocumentKey, IndexedDocument>>,
	rejected: RwLock<HashSet<String>>,
	journal: RwLock<Vec<Write>>,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every later upsert or delete of `document_id` fail for that item only.
	pub fn reject_writes_for(&self, document_id: &str) {
		self.rejected.write().unwrap_or_else(|err| err.into_inner()).insert(document_id.to_string());
	}

	pub fn document_ids(&self) -> Vec<String> {
		self.docs
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.values()
			.map(|doc| doc.document_id.clone())
			.collect()
	}

	pub fn get(&self, document_id: &str) -> Option<IndexedDocument> {
		let key = DocumentKey::parse(document_id).ok()?;

		self.docs.read().unwrap_or_else(|err| err.into_inner()).get(&key).cloned()
	}

	pub fn journal(&self) -> Vec<Write> {
		self.journal.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn is_rejected(&self, document_id: &str) -> bool {
		self.rejected.read().unwrap_or_else(|err| err.into_inner()).contains(document_id)
	}

	fn record(&self, write: Write) {
		self.journal.write().unwrap_or_else(|err| err.into_inner()).push(write);
	}

	fn upsert_now(&self, docs: &[IndexedDocument]) -> BatchReport {
		self.record(Write::Upsert(docs.iter().map(|doc| doc.document_id.clone()).collect()));

		let mut stored = self.docs.write().unwrap_or_else(|err| err.into_inner());
		let items = docs
			.iter()
			.map(|doc| {
				let error = if self.is_rejected(&doc.document_id) {
					Some("Rejected by index.".to_string())
				} else if DocumentKey::parse(&doc.document_id).ok() != Some(doc.key) {
					Some("Document id does not match its key.".to_string())
				} else {
					stored.insert(doc.key, doc.clone());

					None
				};

				ItemStatus { document_id: doc.document_id.clone(), error }
			})
			.collect();

		BatchReport { items }
	}

	fn delete_now(&self, document_ids: &[String]) -> BatchReport {
		self.record(Write::Delete(document_ids.to_vec()));

		let mut stored = self.docs.write().unwrap_or_else(|err| err.into_inner());
		let items = document_ids
			.iter()
			.map(|document_id| {
				let error = if self.is_rejected(document_id) {
					Some("Rejected by index.".to_string())
				} else {
					// Deleting an unknown id is not an error.
					if let Ok(key) = DocumentKey::parse(document_id) {
						stored.remove(&key);
					}

					None
				};

				ItemStatus { document_id: document_id.clone(), error }
			})
			.collect();

		BatchReport { items }
	}

	fn query_now(&self, query: &HybridQuery) -> QueryPage {
		let stored = self.docs.read().unwrap_or_else(|err| err.into_inner());
		let terms = query_terms(&query.text);
		let score = |doc: &IndexedDocument| blended_score(&query.vector, &terms, doc);
		let hit = |doc: &IndexedDocument| SearchHit {
			score: score(doc),
			document: project(doc, query.projection),
		};
		let top = query.top as usize;
		let hits = match query.order {
			QueryOrder::Relevance => {
				let mut hits = stored.values().map(hit).collect::<Vec<_>>();

				hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.document.key.cmp(&b.document.key)));
				hits.truncate(top);

				hits
			},
			QueryOrder::Key { after } => stored
				.iter()
				.filter(|(key, _)| after.is_none_or(|after| **key > after))
				.take(top)
				.map(|(_, doc)| hit(doc))
				.collect(),
		};

		QueryPage { hits, total_count: stored.len() as u64 }
	}

	fn fetch_now(&self, document_ids: &[String]) -> Vec<StoredDocument> {
		let stored = self.docs.read().unwrap_or_else(|err| err.into_inner());

		document_ids
			.iter()
			.filter_map(|document_id| DocumentKey::parse(document_id).ok())
			.filter_map(|key| stored.get(&key))
			.map(|doc| project(doc, Projection::Full))
			.collect()
	}
}
impl SearchIndex for MemoryIndex {
	fn upsert<'a>(&'a self, docs: &'a [IndexedDocument]) -> BoxFuture<'a, Result<BatchReport>> {
		Box::pin(async move { Ok(self.upsert_now(docs)) })
	}

	fn delete<'a>(&'a self, document_ids: &'a [String]) -> BoxFuture<'a, Result<BatchReport>> {
		Box::pin(async move { Ok(self.delete_now(document_ids)) })
	}

	fn document_ids_for_record(&self, record_id: i64) -> BoxFuture<'_, Result<Vec<String>>> {
		Box::pin(async move {
			let stored = self.docs.read().unwrap_or_else(|err| err.into_inner());

			Ok(stored
				.values()
				.filter(|doc| doc.key.record_id == record_id)
				.map(|doc| doc.document_id.clone())
				.collect())
		})
	}

	fn query<'a>(&'a self, query: &'a HybridQuery) -> BoxFuture<'a, Result<QueryPage>> {
		Box::pin(async move { Ok(self.query_now(query)) })
	}

	fn fetch<'a>(
		&'a self,
		document_ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(async move { Ok(self.fetch_now(document_ids)) })
	}
}

fn project(doc: &IndexedDocument, projection: Projection) -> StoredDocument {
	let mut stored = StoredDocument::from(doc.clone());

	if projection == Projection::Minimal {
		stored.chunk_text = None;
		stored.metadata.file_path = None;
		stored.metadata.title = None;
		stored.metadata.url = None;
	}

	stored
}

fn query_terms(text: &str) -> Vec<String> {
	let mut seen = HashSet::new();

	text.split_whitespace()
		.map(|term| term.trim_matches(|ch: char| !ch.is_alphanumeric()).to_lowercase())
		.filter(|term| !term.is_empty() && seen.insert(term.clone()))
		.collect()
}

fn blended_score(vector: &[f32], terms: &[String], doc: &IndexedDocument) -> f32 {
	let dense = doc.vector.as_deref().map(|stored| cosine_sim(vector, stored)).unwrap_or(0.0);
	let lexical = if terms.is_empty() {
		0.0
	} else {
		let text = doc.chunk_text.to_lowercase();

		terms.iter().filter(|term| text.contains(term.as_str())).count() as f32 / terms.len() as f32
	};

	hybrid_score(dense, lexical)
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
	let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if mag_a < f32::EPSILON || mag_b < f32::EPSILON { 0.0 } else { dot / (mag_a * mag_b) }
}
