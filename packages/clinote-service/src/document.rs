use clinote_chunking::Chunk;
use clinote_domain::{DocumentKey, IndexedDocument, SourceRecord};

use crate::{ClinoteService, Error, Result};

impl ClinoteService {
	/// Builds the index document for one chunk of `record`. Only chunks with visible text are
	/// embedded.
	pub async fn build_document(
		&self,
		record: &SourceRecord,
		chunk: &Chunk,
	) -> Result<IndexedDocument> {
		let key = DocumentKey::new(record.record_id, chunk.order);

		// Out-of-range keys cannot be indexed, so fail before anything is written.
		key.chunk_key()?;

		let vector = if chunk.text.trim().is_empty() {
			None
		} else {
			let vector = self.providers.embedding.embed(&chunk.text).await?;

			check_dimensions(&vector, self.cfg.storage.qdrant.vector_dim)?;

			tracing::debug!(document_id = %key, "Chunk embedded.");

			Some(vector)
		};

		Ok(IndexedDocument {
			document_id: key.document_id(),
			key,
			chunk_text: chunk.text.clone(),
			vector,
			metadata: record.metadata.clone(),
		})
	}
}

pub(crate) fn check_dimensions(vector: &[f32], expected: u32) -> Result<()> {
	if vector.len() != expected as usize {
		return Err(Error::Embedding {
			message: format!(
				"Embedding has {} dimensions, expected {expected}.",
				vector.len()
			),
		});
	}

	Ok(())
}
