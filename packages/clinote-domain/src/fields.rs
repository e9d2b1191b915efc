//! Index field names. Only fields listed here are ever written to or read from the index.

pub const DOCUMENT_ID: &str = "document_id";
pub const RECORD_ID: &str = "record_id";
pub const CHUNK_ORDER: &str = "chunk_order";
/// Single sortable integer encoding `(record_id, chunk_order)`.
pub const CHUNK_KEY: &str = "chunk_key";
pub const CHUNK_TEXT: &str = "chunk_text";

pub const CSN: &str = "csn";
pub const MRN: &str = "mrn";
pub const NOTE_TYPE: &str = "note_type";
pub const NOTE_STATUS: &str = "note_status";
pub const AUTHOR_ID: &str = "author_id";
pub const AUTHOR_FIRST_NAME: &str = "author_first_name";
pub const AUTHOR_LAST_NAME: &str = "author_last_name";
pub const PATIENT_FIRST_NAME: &str = "patient_first_name";
pub const PATIENT_LAST_NAME: &str = "patient_last_name";
pub const DEPARTMENT: &str = "department";
pub const GENDER: &str = "gender";
pub const BIRTH_DATE: &str = "birth_date";
pub const FILE_PATH: &str = "file_path";
pub const TITLE: &str = "title";
pub const URL: &str = "url";

/// Fields returned by minimal projections. Excludes chunk text and citation fields.
pub const MINIMAL: [&str; 16] = [
	DOCUMENT_ID,
	RECORD_ID,
	CHUNK_ORDER,
	CHUNK_KEY,
	CSN,
	MRN,
	NOTE_TYPE,
	NOTE_STATUS,
	AUTHOR_ID,
	AUTHOR_FIRST_NAME,
	AUTHOR_LAST_NAME,
	PATIENT_FIRST_NAME,
	PATIENT_LAST_NAME,
	DEPARTMENT,
	GENDER,
	BIRTH_DATE,
];

/// Low-cardinality string fields worth a keyword index.
pub const KEYWORD: [&str; 5] = [NOTE_TYPE, NOTE_STATUS, AUTHOR_ID, DEPARTMENT, GENDER];

/// Integer fields used for filtering and ordering.
pub const INTEGER: [&str; 5] = [RECORD_ID, CHUNK_ORDER, CHUNK_KEY, CSN, MRN];
