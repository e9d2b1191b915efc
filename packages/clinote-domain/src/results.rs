use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Result, StoredDocument};

/// A scored hit without chunk text, used while scanning for threshold matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinimalSearchResult {
	pub score: f32,
	pub document_id: String,
	pub record_id: i64,
	pub chunk_order: u32,
	pub csn: Option<i64>,
	pub mrn: Option<i64>,
	pub note_type: Option<String>,
	pub note_status: Option<String>,
	pub author_id: Option<String>,
	pub patient_first_name: Option<String>,
	pub patient_last_name: Option<String>,
	pub author_first_name: Option<String>,
	pub author_last_name: Option<String>,
	pub department: Option<String>,
	pub gender: Option<String>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub birth_date: Option<OffsetDateTime>,
}
impl MinimalSearchResult {
	pub fn from_document(score: f32, doc: &StoredDocument) -> Self {
		let metadata = &doc.metadata;

		Self {
			score,
			document_id: doc.document_id.clone(),
			record_id: doc.key.record_id,
			chunk_order: doc.key.chunk_order,
			csn: metadata.csn,
			mrn: metadata.mrn,
			note_type: metadata.note_type.clone(),
			note_status: metadata.note_status.clone(),
			author_id: metadata.author_id.clone(),
			patient_first_name: metadata.patient_first_name.clone(),
			patient_last_name: metadata.patient_last_name.clone(),
			author_first_name: metadata.author_first_name.clone(),
			author_last_name: metadata.author_last_name.clone(),
			department: metadata.department.clone(),
			gender: metadata.gender.clone(),
			birth_date: metadata.birth_date,
		}
	}
}

/// Citation-ready chunk content handed to downstream consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportingContentRecord {
	pub title: Option<String>,
	/// Chunk text with line breaks flattened to spaces.
	pub content: String,
	pub url: Option<String>,
	pub file_path: Option<String>,
	pub chunk_id: String,
	/// JSON object of the descriptive fields, keyed like the upstream export.
	pub additional_content: String,
}
impl SupportingContentRecord {
	/// Returns `None` when the document has no chunk text.
	pub fn from_document(doc: &StoredDocument) -> Result<Option<Self>> {
		let Some(text) = doc.chunk_text.as_deref() else {
			return Ok(None);
		};

		Ok(Some(Self {
			title: doc.metadata.title.clone(),
			content: text.replace(['\r', '\n'], " "),
			url: doc.metadata.url.clone(),
			file_path: doc.metadata.file_path.clone(),
			chunk_id: doc.key.chunk_order.to_string(),
			additional_content: serde_json::to_string(&additional_content(doc))?,
		}))
	}
}

fn additional_content(doc: &StoredDocument) -> Map<String, Value> {
	let metadata = &doc.metadata;
	let mut out = Map::new();
	let mut put = |key: &str, value: Option<Value>| {
		if let Some(value) = value {
			out.insert(key.to_string(), value);
		}
	};

	put("CSN", metadata.csn.map(Value::from));
	put("NoteType", metadata.note_type.clone().map(Value::from));
	put("NoteStatus", metadata.note_status.clone().map(Value::from));
	put("AuthorId", metadata.author_id.clone().map(Value::from));
	put("AuthorFirstName", metadata.author_first_name.clone().map(Value::from));
	put("AuthorLastName", metadata.author_last_name.clone().map(Value::from));
	put("Department", metadata.department.clone().map(Value::from));
	put("Gender", metadata.gender.clone().map(Value::from));
	put(
		"BirthDate",
		metadata.birth_date.and_then(|ts| ts.format(&Rfc3339).ok()).map(Value::from),
	);
	put("NoteId", Some(Value::from(doc.key.record_id)));
	put("PatientFirstName", metadata.patient_first_name.clone().map(Value::from));
	put("PatientLastName", metadata.patient_last_name.clone().map(Value::from));
	put("MRN", metadata.mrn.map(Value::from));

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{DocumentKey, RecordMetadata};

	fn stored(text: Option<&str>) -> StoredDocument {
		StoredDocument {
			document_id: "42-2".to_string(),
			key: DocumentKey::new(42, 2),
			chunk_text: text.map(str::to_string),
			metadata: RecordMetadata {
				mrn: Some(900),
				note_type: Some("Progress Notes".to_string()),
				title: Some("note.json".to_string()),
				..Default::default()
			},
		}
	}

	#[test]
	fn flattens_line_breaks_and_serializes_metadata() {
		let record = SupportingContentRecord::from_document(&stored(Some("line one\r\nline two")))
			.expect("conversion")
			.expect("record with text");

		assert_eq!(record.content, "line one  line two");
		assert_eq!(record.chunk_id, "2");
		assert_eq!(record.title.as_deref(), Some("note.json"));

		let extra: Value = serde_json::from_str(&record.additional_content).expect("json");

		assert_eq!(extra["NoteId"], 42);
		assert_eq!(extra["MRN"], 900);
		assert_eq!(extra["NoteType"], "Progress Notes");
		assert!(extra.get("Gender").is_none());
	}

	#[test]
	fn documents_without_text_are_skipped() {
		assert!(SupportingContentRecord::from_document(&stored(None)).expect("conversion").is_none());
	}

	#[test]
	fn minimal_result_copies_the_key() {
		let result = MinimalSearchResult::from_document(0.5, &stored(None));

		assert_eq!(result.record_id, 42);
		assert_eq!(result.chunk_order, 2);
		assert_eq!(result.mrn, Some(900));
	}
}
