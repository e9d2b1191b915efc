pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid document id {document_id:?}.")]
	InvalidDocumentId { document_id: String },
	#[error("Record id {record_id} is outside the indexable range.")]
	RecordIdOutOfRange { record_id: i64 },
	#[error("Chunk order {chunk_order} is outside the indexable range.")]
	ChunkOrderOutOfRange { chunk_order: u32 },
	#[error("Payload field {field} is missing or malformed.")]
	InvalidPayload { field: &'static str },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}
