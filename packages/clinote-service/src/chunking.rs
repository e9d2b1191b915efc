//! Splits a record's content into retrieval-sized chunks.
//!
//! Content within the token budget becomes a single chunk without a layout call. Longer content
//! is rendered as markdown by the layout provider, then split into lines and packed into
//! overlapping paragraphs.

use clinote_chunking::{Chunk, ChunkingConfig, split_markdown_lines, split_markdown_paragraphs};
use clinote_domain::SourceRecord;

use crate::{ClinoteService, Error, Result};

impl ClinoteService {
	pub fn chunking_config(&self) -> Result<ChunkingConfig> {
		Ok(ChunkingConfig::from_percent(
			self.cfg.chunking.max_tokens,
			self.cfg.chunking.overlap_percent,
		)?)
	}

	pub async fn chunk_record(&self, record: &SourceRecord) -> Result<Vec<Chunk>> {
		let cfg = self.chunking_config()?;
		let max_tokens = cfg.max_tokens as usize;

		if record.content.trim().is_empty() {
			tracing::debug!(record_id = record.record_id, "Record has no content to chunk.");

			return Ok(Vec::new());
		}

		let tokens = self.counter.count(&record.content);

		if tokens <= max_tokens {
			tracing::debug!(
				record_id = record.record_id,
				tokens,
				"Record fits in a single chunk."
			);

			return Ok(vec![Chunk { order: 0, text: record.content.clone() }]);
		}

		let markdown = self.providers.layout.analyze(&record.content).await?;
		let lines = split_markdown_lines(&markdown, max_tokens, self.counter.as_ref());
		let paragraphs = split_markdown_paragraphs(
			&lines,
			max_tokens,
			cfg.overlap_tokens as usize,
			self.counter.as_ref(),
		)?;
		let mut chunks = Vec::with_capacity(paragraphs.len());

		for (order, text) in paragraphs.into_iter().enumerate() {
			let order = u32::try_from(order).map_err(|_| Error::InvalidRecord {
				message: format!("Record {} produced too many chunks.", record.record_id),
			})?;

			chunks.push(Chunk { order, text });
		}

		tracing::debug!(
			record_id = record.record_id,
			tokens,
			lines = lines.len(),
			chunks = chunks.len(),
			"Record split into chunks."
		);

		Ok(chunks)
	}
}
