//! Hybrid retrieval over the chunk index.
//!
//! `query_all_above_threshold` walks the index in key order with a keyset cursor, so every
//! document is scored at most once no matter how scores are distributed across pages.

use std::collections::HashMap;

use clinote_config::ThresholdScan;
use clinote_domain::{DocumentKey, MinimalSearchResult, SupportingContentRecord};
use clinote_storage::{HybridQuery, Projection, QueryOrder, SearchHit};

use crate::{ClinoteService, Error, Result, document::check_dimensions};

impl ClinoteService {
	/// Best `k` chunks for `query` as citation-ready records, best first.
	pub async fn query_top_k(&self, query: &str, k: u32) -> Result<Vec<SupportingContentRecord>> {
		if k == 0 {
			return Err(Error::InvalidRequest { message: "k must be greater than zero.".to_string() });
		}

		let request = HybridQuery {
			text: query.to_string(),
			vector: self.embed_query(query).await?,
			top: k,
			order: QueryOrder::Relevance,
			projection: Projection::Full,
			fusion: self.cfg.retrieval.fusion,
		};
		let mut hits = self.index.query(&request).await?.hits;

		if self.rerank_hits(query, &mut hits).await? {
			hits.sort_by(|a, b| {
				b.score.total_cmp(&a.score).then_with(|| a.document.key.cmp(&b.document.key))
			});
		}

		let mut out = Vec::with_capacity(hits.len());

		for hit in &hits {
			match SupportingContentRecord::from_document(&hit.document)? {
				Some(record) => out.push(record),
				None => tracing::debug!(
					document_id = %hit.document.document_id,
					"Skipping hit without chunk text."
				),
			}
		}

		tracing::info!(k, returned = out.len(), "Top-k query finished.");

		Ok(out)
	}

	/// Every chunk scoring strictly above `threshold`, best first, without chunk text.
	pub async fn query_all_above_threshold(
		&self,
		query: &str,
		threshold: f32,
	) -> Result<Vec<MinimalSearchResult>> {
		let retrieval = &self.cfg.retrieval;
		let vector = self.embed_query(query).await?;
		// Rerank needs the chunk text, which minimal results drop again.
		let projection = if retrieval.semantic_rerank { Projection::Full } else { Projection::Minimal };
		let mut cursor: Option<DocumentKey> = None;
		let mut scanned = 0_u64;
		let mut kept = Vec::new();

		for page_number in 1..=retrieval.max_pages {
			let request = HybridQuery {
				text: query.to_string(),
				vector: vector.clone(),
				top: retrieval.page_size,
				order: QueryOrder::Key { after: cursor },
				projection,
				fusion: retrieval.fusion,
			};
			let page = self.index.query(&request).await?;
			let mut hits = page.hits;

			if hits.is_empty() {
				break;
			}

			self.rerank_hits(query, &mut hits).await?;

			let fetched = hits.len();

			scanned += fetched as u64;
			cursor = hits.last().map(|hit| hit.document.key);

			let mut missed = false;

			for hit in &hits {
				if hit.score > threshold {
					kept.push(MinimalSearchResult::from_document(hit.score, &hit.document));
				} else if retrieval.threshold_scan == ThresholdScan::StopAtFirstMiss {
					missed = true;

					break;
				}
			}

			tracing::debug!(
				page = page_number,
				fetched,
				scanned,
				total = page.total_count,
				kept = kept.len(),
				"Threshold page scanned."
			);

			if missed || fetched < retrieval.page_size as usize || scanned >= page.total_count {
				break;
			}
			if page_number == retrieval.max_pages {
				tracing::warn!(
					max_pages = retrieval.max_pages,
					scanned,
					total = page.total_count,
					"Threshold scan stopped at the page limit."
				);
			}
		}

		kept.retain(|result| result.score > threshold);
		kept.sort_by(|a, b| {
			b.score
				.total_cmp(&a.score)
				.then_with(|| (a.record_id, a.chunk_order).cmp(&(b.record_id, b.chunk_order)))
		});

		tracing::info!(threshold, scanned, kept = kept.len(), "Threshold query finished.");

		Ok(kept)
	}

	/// Full content for `document_ids` in the order given. Unknown ids and chunks without text
	/// are skipped.
	pub async fn retrieve_full(
		&self,
		document_ids: &[String],
	) -> Result<Vec<SupportingContentRecord>> {
		if document_ids.is_empty() {
			return Ok(Vec::new());
		}

		let docs = self.index.fetch(document_ids).await?;
		let by_id = docs.iter().map(|doc| (doc.document_id.as_str(), doc)).collect::<HashMap<_, _>>();
		let mut out = Vec::with_capacity(document_ids.len());

		for document_id in document_ids {
			let Some(doc) = by_id.get(document_id.as_str()) else {
				tracing::debug!(document_id = %document_id, "Requested document not found.");

				continue;
			};

			match SupportingContentRecord::from_document(doc)? {
				Some(record) => out.push(record),
				None => tracing::debug!(document_id = %document_id, "Requested document has no text."),
			}
		}

		Ok(out)
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		if query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
		}

		let vector = self.providers.embedding.embed(query).await?;

		check_dimensions(&vector, self.cfg.storage.qdrant.vector_dim)?;

		Ok(vector)
	}

	/// Replaces index scores with rerank scores when semantic rerank is enabled. Returns whether
	/// scores changed.
	async fn rerank_hits(&self, query: &str, hits: &mut [SearchHit]) -> Result<bool> {
		if !self.cfg.retrieval.semantic_rerank || hits.is_empty() {
			return Ok(false);
		}

		let Some(rerank) = self.providers.rerank.as_ref() else {
			return Err(Error::InvalidRequest {
				message: "Semantic rerank is enabled but no rerank provider is configured."
					.to_string(),
			});
		};
		let docs = hits
			.iter()
			.map(|hit| hit.document.chunk_text.clone().unwrap_or_default())
			.collect::<Vec<_>>();
		let scores = rerank.rerank(query, &docs).await?;

		if scores.len() != hits.len() {
			return Err(Error::Rerank {
				message: format!("Rerank returned {} scores for {} documents.", scores.len(), hits.len()),
			});
		}

		for (hit, score) in hits.iter_mut().zip(scores) {
			hit.score = score;
		}

		Ok(true)
	}
}

/// Ids of the `n` best results, best first. Ties go to the lower key.
pub fn select_top(results: &[MinimalSearchResult], n: usize) -> Vec<String> {
	let mut ranked = results.iter().collect::<Vec<_>>();

	ranked.sort_by(|a, b| {
		b.score
			.total_cmp(&a.score)
			.then_with(|| (a.record_id, a.chunk_order).cmp(&(b.record_id, b.chunk_order)))
	});

	ranked.into_iter().take(n).map(|result| result.document_id.clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(record_id: i64, chunk_order: u32, score: f32) -> MinimalSearchResult {
		MinimalSearchResult {
			score,
			document_id: format!("{record_id}-{chunk_order}"),
			record_id,
			chunk_order,
			csn: None,
			mrn: None,
			note_type: None,
			note_status: None,
			author_id: None,
			patient_first_name: None,
			patient_last_name: None,
			author_first_name: None,
			author_last_name: None,
			department: None,
			gender: None,
			birth_date: None,
		}
	}

	#[test]
	fn select_top_ranks_by_score_then_key() {
		let results = vec![result(3, 0, 0.5), result(1, 2, 0.9), result(1, 1, 0.5), result(2, 0, 0.7)];

		assert_eq!(select_top(&results, 3), vec!["1-2", "2-0", "1-1"]);
		assert_eq!(select_top(&results, 10).len(), 4);
		assert!(select_top(&results, 0).is_empty());
	}
}
