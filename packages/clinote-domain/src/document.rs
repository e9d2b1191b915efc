use std::fmt;

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, RecordMetadata, Result, fields};

/// Chunk orders per record addressable through [`DocumentKey::chunk_key`].
pub const CHUNK_KEY_STRIDE: i64 = 1 << 20;
/// Largest record id magnitude whose chunk keys stay exact as 64-bit floats.
pub const MAX_RECORD_ID: i64 = 1 << 32;

/// Composite identity of one chunk document. Ordered by record id, then chunk order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
	pub record_id: i64,
	pub chunk_order: u32,
}
impl DocumentKey {
	pub fn new(record_id: i64, chunk_order: u32) -> Self {
		Self { record_id, chunk_order }
	}

	/// Parses `"{record_id}-{chunk_order}"`. Record ids may be negative, so the split happens at
	/// the last `-`.
	pub fn parse(document_id: &str) -> Result<Self> {
		let invalid = || Error::InvalidDocumentId { document_id: document_id.to_string() };
		let (record, order) = document_id.rsplit_once('-').ok_or_else(invalid)?;
		let record_id = record.parse::<i64>().map_err(|_| invalid())?;
		let chunk_order = order.parse::<u32>().map_err(|_| invalid())?;

		Ok(Self { record_id, chunk_order })
	}

	pub fn document_id(&self) -> String {
		self.to_string()
	}

	/// Integer that sorts exactly like the key, for indexes that order on a single field.
	pub fn chunk_key(&self) -> Result<i64> {
		if self.record_id.unsigned_abs() >= MAX_RECORD_ID.unsigned_abs() {
			return Err(Error::RecordIdOutOfRange { record_id: self.record_id });
		}
		if i64::from(self.chunk_order) >= CHUNK_KEY_STRIDE {
			return Err(Error::ChunkOrderOutOfRange { chunk_order: self.chunk_order });
		}

		Ok(self.record_id * CHUNK_KEY_STRIDE + i64::from(self.chunk_order))
	}
}
impl fmt::Display for DocumentKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.record_id, self.chunk_order)
	}
}

/// One chunk of a record, ready for the index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedDocument {
	pub document_id: String,
	pub key: DocumentKey,
	pub chunk_text: String,
	/// Present exactly when `chunk_text` has non-whitespace content.
	pub vector: Option<Vec<f32>>,
	pub metadata: RecordMetadata,
}
impl IndexedDocument {
	/// Index payload restricted to the known field set. The source content never leaves the
	/// record.
	pub fn payload(&self) -> Result<Map<String, Value>> {
		let mut payload = Map::new();

		payload.insert(fields::DOCUMENT_ID.to_string(), Value::from(self.document_id.clone()));
		payload.insert(fields::RECORD_ID.to_string(), Value::from(self.key.record_id));
		payload.insert(fields::CHUNK_ORDER.to_string(), Value::from(self.key.chunk_order));
		payload.insert(fields::CHUNK_KEY.to_string(), Value::from(self.key.chunk_key()?));
		payload.insert(fields::CHUNK_TEXT.to_string(), Value::from(self.chunk_text.clone()));

		write_metadata(&mut payload, &self.metadata);

		Ok(payload)
	}
}

/// A chunk document read back from the index. Never carries the vector.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
	pub document_id: String,
	pub key: DocumentKey,
	/// `None` when the read used a minimal projection.
	pub chunk_text: Option<String>,
	pub metadata: RecordMetadata,
}
impl StoredDocument {
	pub fn from_payload(payload: &Map<String, Value>) -> Result<Self> {
		let document_id = payload
			.get(fields::DOCUMENT_ID)
			.and_then(Value::as_str)
			.ok_or(Error::InvalidPayload { field: fields::DOCUMENT_ID })?
			.to_string();
		let record_id = payload
			.get(fields::RECORD_ID)
			.and_then(Value::as_i64)
			.ok_or(Error::InvalidPayload { field: fields::RECORD_ID })?;
		let chunk_order = payload
			.get(fields::CHUNK_ORDER)
			.and_then(Value::as_u64)
			.and_then(|order| u32::try_from(order).ok())
			.ok_or(Error::InvalidPayload { field: fields::CHUNK_ORDER })?;
		let chunk_text = payload.get(fields::CHUNK_TEXT).and_then(Value::as_str).map(str::to_string);

		Ok(Self {
			document_id,
			key: DocumentKey { record_id, chunk_order },
			chunk_text,
			metadata: read_metadata(payload)?,
		})
	}
}
impl From<IndexedDocument> for StoredDocument {
	fn from(doc: IndexedDocument) -> Self {
		Self {
			document_id: doc.document_id,
			key: doc.key,
			chunk_text: Some(doc.chunk_text),
			metadata: doc.metadata,
		}
	}
}

fn write_metadata(payload: &mut Map<String, Value>, metadata: &RecordMetadata) {
	let mut put = |field: &str, value: Option<Value>| {
		if let Some(value) = value {
			payload.insert(field.to_string(), value);
		}
	};

	put(fields::CSN, metadata.csn.map(Value::from));
	put(fields::MRN, metadata.mrn.map(Value::from));
	put(fields::NOTE_TYPE, metadata.note_type.clone().map(Value::from));
	put(fields::NOTE_STATUS, metadata.note_status.clone().map(Value::from));
	put(fields::AUTHOR_ID, metadata.author_id.clone().map(Value::from));
	put(fields::AUTHOR_FIRST_NAME, metadata.author_first_name.clone().map(Value::from));
	put(fields::AUTHOR_LAST_NAME, metadata.author_last_name.clone().map(Value::from));
	put(fields::PATIENT_FIRST_NAME, metadata.patient_first_name.clone().map(Value::from));
	put(fields::PATIENT_LAST_NAME, metadata.patient_last_name.clone().map(Value::from));
	put(fields::DEPARTMENT, metadata.department.clone().map(Value::from));
	put(fields::GENDER, metadata.gender.clone().map(Value::from));
	put(
		fields::BIRTH_DATE,
		metadata.birth_date.and_then(|ts| ts.format(&Rfc3339).ok()).map(Value::from),
	);
	put(fields::FILE_PATH, metadata.file_path.clone().map(Value::from));
	put(fields::TITLE, metadata.title.clone().map(Value::from));
	put(fields::URL, metadata.url.clone().map(Value::from));
}

fn read_metadata(payload: &Map<String, Value>) -> Result<RecordMetadata> {
	let text = |field: &str| payload.get(field).and_then(Value::as_str).map(str::to_string);
	let integer = |field: &str| payload.get(field).and_then(Value::as_i64);
	let birth_date = match text(fields::BIRTH_DATE) {
		Some(raw) => Some(
			OffsetDateTime::parse(&raw, &Rfc3339)
				.map_err(|_| Error::InvalidPayload { field: fields::BIRTH_DATE })?,
		),
		None => None,
	};

	Ok(RecordMetadata {
		csn: integer(fields::CSN),
		mrn: integer(fields::MRN),
		note_type: text(fields::NOTE_TYPE),
		note_status: text(fields::NOTE_STATUS),
		author_id: text(fields::AUTHOR_ID),
		author_first_name: text(fields::AUTHOR_FIRST_NAME),
		author_last_name: text(fields::AUTHOR_LAST_NAME),
		patient_first_name: text(fields::PATIENT_FIRST_NAME),
		patient_last_name: text(fields::PATIENT_LAST_NAME),
		department: text(fields::DEPARTMENT),
		gender: text(fields::GENDER),
		birth_date,
		file_path: text(fields::FILE_PATH),
		title: text(fields::TITLE),
		url: text(fields::URL),
	})
}
