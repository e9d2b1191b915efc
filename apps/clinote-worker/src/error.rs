use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read {path:?}.")]
	ReadInput {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("No record files found under the given inputs.")]
	NoInputs,
	#[error(transparent)]
	Join(#[from] tokio::task::JoinError),
	#[error(transparent)]
	Semaphore(#[from] tokio::sync::AcquireError),
}
