//! Reads record files and synchronizes every record with the index.

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use serde::Serialize;
use serde_json::Value;
use tokio::{sync::Semaphore, task::JoinSet};

use clinote_domain::{SourceRecord, record::strip_bom};
use clinote_service::{ClinoteService, SyncReport};

use crate::{Error, Result, locks::RecordLocks};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
	pub files: usize,
	pub records: usize,
	/// Records that could not be parsed or were missing required fields.
	pub skipped: usize,
	pub synced: usize,
	pub failed: usize,
	pub chunks: usize,
	pub upserted: usize,
	pub upsert_failures: usize,
	pub deleted: usize,
	pub delete_failures: usize,
}
impl IngestSummary {
	fn add(&mut self, report: &SyncReport) {
		self.synced += 1;
		self.chunks += report.chunk_count;
		self.upserted += report.upserted;
		self.upsert_failures += report.upsert_failures;
		self.deleted += report.deleted;
		self.delete_failures += report.delete_failures;
	}
}

/// Expands directories to their `*.json` files, sorted by path. Files are taken as given.
pub fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();

	for input in inputs {
		if input.is_dir() {
			let entries = fs::read_dir(input)
				.map_err(|source| Error::ReadInput { path: input.clone(), source })?;
			let mut found = Vec::new();

			for entry in entries {
				let path =
					entry.map_err(|source| Error::ReadInput { path: input.clone(), source })?.path();

				if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
					found.push(path);
				}
			}

			found.sort();
			files.extend(found);
		} else {
			files.push(input.clone());
		}
	}

	if files.is_empty() {
		return Err(Error::NoInputs);
	}

	Ok(files)
}

/// Parses every JSON object in `raw`, which may hold several objects back to back. Objects that
/// are not valid records are counted and skipped. A syntax error ends the file.
pub fn parse_records(raw: &str, source: &Path) -> (Vec<SourceRecord>, usize) {
	let mut records = Vec::new();
	let mut skipped = 0;

	let stream = serde_json::Deserializer::from_str(strip_bom(raw)).into_iter::<Value>();

	for (position, value) in stream.enumerate() {
		let value = match value {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(
					path = %source.display(),
					position,
					error = %err,
					"Record file is not valid JSON."
				);

				skipped += 1;

				break;
			},
		};

		match serde_json::from_value::<SourceRecord>(value) {
			Ok(record) => records.push(record),
			Err(err) => {
				tracing::warn!(
					path = %source.display(),
					position,
					error = %err,
					"Skipping malformed record."
				);

				skipped += 1;
			},
		}
	}

	(records, skipped)
}

/// Points citation fields at the source file unless the record already carries them.
pub fn fill_citation(record: &mut SourceRecord, source: &Path) {
	let metadata = &mut record.metadata;

	if metadata.file_path.is_none() {
		metadata.file_path = Some(source.display().to_string());
	}
	if metadata.title.is_none() {
		metadata.title = source.file_name().map(|name| name.to_string_lossy().into_owned());
	}
	if metadata.url.is_none() {
		let absolute = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());

		metadata.url = Some(format!("file://{}", absolute.display()));
	}
}

/// Syncs every record of `files`, at most `concurrency` at a time. Records with the same id are
/// synced one after another in input order.
pub async fn ingest_files(
	service: Arc<ClinoteService>,
	files: &[PathBuf],
	concurrency: usize,
) -> Result<IngestSummary> {
	let permits = Arc::new(Semaphore::new(concurrency.max(1)));
	let locks = RecordLocks::new();
	let mut tasks = JoinSet::new();
	let mut summary = IngestSummary { files: files.len(), ..Default::default() };

	for path in files {
		let raw = fs::read_to_string(path)
			.map_err(|source| Error::ReadInput { path: path.clone(), source })?;
		let (records, skipped) = parse_records(&raw, path);

		summary.records += records.len() + skipped;
		summary.skipped += skipped;

		tracing::info!(
			path = %path.display(),
			records = records.len(),
			skipped,
			"Record file parsed."
		);

		for mut record in records {
			fill_citation(&mut record, path);

			// Taking both guards here keeps same-record syncs in input order.
			let permit = permits.clone().acquire_owned().await?;
			let guard = locks.lock(record.record_id).await;
			let service = service.clone();

			tasks.spawn(async move {
				let result = service.sync(&record).await;

				drop(guard);
				drop(permit);

				(record.record_id, result)
			});

			while let Some(done) = tasks.try_join_next() {
				record_outcome(&mut summary, done?);
			}
		}
	}

	while let Some(done) = tasks.join_next().await {
		record_outcome(&mut summary, done?);
	}

	tracing::info!(
		files = summary.files,
		records = summary.records,
		synced = summary.synced,
		failed = summary.failed,
		skipped = summary.skipped,
		"Ingestion finished."
	);

	Ok(summary)
}

fn record_outcome(
	summary: &mut IngestSummary,
	(record_id, result): (i64, clinote_service::Result<SyncReport>),
) {
	match result {
		Ok(report) => summary.add(&report),
		Err(err) => {
			tracing::error!(record_id, error = %err, "Record sync failed.");

			summary.failed += 1;
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_concatenated_records_and_skips_bad_shapes() {
		let raw = "\u{FEFF}{\"NoteId\":1,\"NoteContent\":\"a\"}\n\
			{\"NoteContent\":\"missing id\"}{\"NoteId\":2}";
		let (records, skipped) = parse_records(raw, Path::new("notes.json"));

		assert_eq!(records.iter().map(|record| record.record_id).collect::<Vec<_>>(), vec![1, 2]);
		assert_eq!(records[1].content, "");
		assert_eq!(skipped, 1);
	}

	#[test]
	fn syntax_errors_end_the_file() {
		let raw = "{\"NoteId\":1} {\"NoteId\": oops} {\"NoteId\":3}";
		let (records, skipped) = parse_records(raw, Path::new("x.json"));

		assert_eq!(records.len(), 1);
		assert_eq!(skipped, 1);
	}

	#[test]
	fn citation_fields_fill_only_when_absent() {
		let mut record =
			SourceRecord::from_json("{\"NoteId\":5,\"Title\":\"Discharge\"}").expect("record");

		fill_citation(&mut record, Path::new("exports/note-5.json"));

		assert_eq!(record.metadata.title.as_deref(), Some("Discharge"));
		assert_eq!(record.metadata.file_path.as_deref(), Some("exports/note-5.json"));
		assert!(record.metadata.url.as_deref().is_some_and(|url| url.starts_with("file://")));
		assert!(record.metadata.url.as_deref().is_some_and(|url| url.ends_with("note-5.json")));
	}
}
