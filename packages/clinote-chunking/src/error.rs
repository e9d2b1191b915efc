pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("Failed to load tokenizer {repo:?}: {message}")]
	LoadTokenizer { repo: String, message: String },
}
