use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A clinical note as delivered by the upstream export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
	#[serde(rename = "NoteId")]
	pub record_id: i64,
	#[serde(rename = "NoteContent", default)]
	pub content: String,
	#[serde(flatten)]
	pub metadata: RecordMetadata,
}
impl SourceRecord {
	/// Parses one record. A leading UTF-8 byte order mark is ignored.
	pub fn from_json(raw: &str) -> serde_json::Result<Self> {
		serde_json::from_str(strip_bom(raw))
	}
}

/// Descriptive fields copied verbatim onto every chunk of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordMetadata {
	#[serde(rename = "CSN")]
	pub csn: Option<i64>,
	#[serde(rename = "MRN")]
	pub mrn: Option<i64>,
	pub note_type: Option<String>,
	pub note_status: Option<String>,
	pub author_id: Option<String>,
	pub author_first_name: Option<String>,
	pub author_last_name: Option<String>,
	pub patient_first_name: Option<String>,
	pub patient_last_name: Option<String>,
	pub department: Option<String>,
	pub gender: Option<String>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub birth_date: Option<OffsetDateTime>,
	pub file_path: Option<String>,
	pub title: Option<String>,
	pub url: Option<String>,
}

pub fn strip_bom(raw: &str) -> &str {
	raw.strip_prefix('\u{FEFF}').unwrap_or(raw)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_upstream_shape() {
		let raw = "\u{FEFF}{\"NoteId\":42,\"NoteContent\":\"Patient stable.\",\"CSN\":7,\
			\"NoteType\":\"Progress Notes\",\"AuthorFirstName\":\"Ada\",\
			\"BirthDate\":\"1980-02-03T00:00:00Z\",\"Unknown\":true}";
		let record = SourceRecord::from_json(raw).expect("Record must parse.");

		assert_eq!(record.record_id, 42);
		assert_eq!(record.content, "Patient stable.");
		assert_eq!(record.metadata.csn, Some(7));
		assert_eq!(record.metadata.note_type.as_deref(), Some("Progress Notes"));
		assert_eq!(record.metadata.author_first_name.as_deref(), Some("Ada"));
		assert_eq!(record.metadata.birth_date.map(|ts| ts.year()), Some(1980));
		assert!(record.metadata.mrn.is_none());
	}

	#[test]
	fn missing_note_id_is_a_shape_error() {
		assert!(SourceRecord::from_json("{\"NoteContent\":\"text\"}").is_err());
	}

	#[test]
	fn missing_content_defaults_to_empty() {
		let record = SourceRecord::from_json("{\"NoteId\":1}").expect("Record must parse.");

		assert!(record.content.is_empty());
	}
}
