//! Keeps the index in step with the latest chunking of a record.
//!
//! Documents are built before the index is touched. The new set is upserted first and stale
//! chunks beyond the new highest order are deleted afterwards, so a reader never sees a record
//! with fewer chunks than either version had.

use clinote_domain::{DocumentKey, SourceRecord};
use clinote_storage::BatchReport;

use crate::{ClinoteService, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub record_id: i64,
	pub chunk_count: usize,
	pub upserted: usize,
	pub upsert_failures: usize,
	pub deleted: usize,
	pub delete_failures: usize,
}

impl ClinoteService {
	pub async fn sync(&self, record: &SourceRecord) -> Result<SyncReport> {
		let record_id = record.record_id;
		let chunks = self.chunk_record(record).await?;
		let mut documents = Vec::with_capacity(chunks.len());

		for chunk in &chunks {
			documents.push(self.build_document(record, chunk).await?);
		}

		let max_order = chunks.iter().map(|chunk| i64::from(chunk.order)).max().unwrap_or(-1);
		let existing = self.index.document_ids_for_record(record_id).await?;
		let stale = stale_document_ids(record_id, &existing, max_order);
		let mut report = SyncReport { record_id, chunk_count: chunks.len(), ..Default::default() };

		tracing::trace!(record_id, existing = ?existing, stale = ?stale, "Existing chunks compared.");

		if !documents.is_empty() {
			let batch = self.index.upsert(&documents).await?;

			log_failures(record_id, "upsert", &batch);

			report.upserted = batch.succeeded();
			report.upsert_failures = batch.items.len() - report.upserted;
		}
		if !stale.is_empty() {
			let batch = self.index.delete(&stale).await?;

			log_failures(record_id, "delete", &batch);

			report.deleted = batch.succeeded();
			report.delete_failures = batch.items.len() - report.deleted;
		}

		tracing::info!(
			record_id,
			chunks = report.chunk_count,
			upserted = report.upserted,
			upsert_failures = report.upsert_failures,
			deleted = report.deleted,
			delete_failures = report.delete_failures,
			"Record synchronized."
		);

		Ok(report)
	}
}

/// Ids of `record_id` whose chunk order is above `max_order`. Ids that are not composite keys of
/// this record are left alone.
pub fn stale_document_ids(record_id: i64, existing: &[String], max_order: i64) -> Vec<String> {
	existing
		.iter()
		.filter(|document_id| match DocumentKey::parse(document_id) {
			Ok(key) if key.record_id == record_id => i64::from(key.chunk_order) > max_order,
			_ => {
				tracing::warn!(record_id, document_id = %document_id, "Ignoring unrecognized document id.");

				false
			},
		})
		.cloned()
		.collect()
}

fn log_failures(record_id: i64, operation: &str, batch: &BatchReport) {
	for item in batch.failures() {
		tracing::error!(
			record_id,
			operation,
			document_id = %item.document_id,
			error = item.error.as_deref().unwrap_or_default(),
			"Index write failed for document."
		);
	}

	tracing::info!(
		record_id,
		operation,
		succeeded = batch.succeeded(),
		total = batch.items.len(),
		"Index batch finished."
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ids(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn keeps_orders_up_to_the_new_maximum() {
		let existing = ids(&["42-0", "42-1", "42-2", "42-3"]);

		assert_eq!(stale_document_ids(42, &existing, 1), ids(&["42-2", "42-3"]));
	}

	#[test]
	fn empty_chunking_marks_everything_stale() {
		let existing = ids(&["7-0", "7-1"]);

		assert_eq!(stale_document_ids(7, &existing, -1), existing);
	}

	#[test]
	fn foreign_and_malformed_ids_are_ignored() {
		let existing = ids(&["42-5", "420-5", "legacy", "42-x"]);

		assert_eq!(stale_document_ids(42, &existing, 0), ids(&["42-5"]));
	}
}
