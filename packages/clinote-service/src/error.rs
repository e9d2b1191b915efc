pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid record: {message}")]
	InvalidRecord { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Chunking error: {0}")]
	Chunking(#[from] clinote_chunking::Error),
	#[error("Layout error: {message}")]
	Layout { message: String },
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Rerank error: {message}")]
	Rerank { message: String },
	#[error("Index error: {0}")]
	Index(#[from] clinote_storage::Error),
	#[error(transparent)]
	Domain(#[from] clinote_domain::Error),
}
