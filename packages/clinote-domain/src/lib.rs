pub mod document;
pub mod fields;
pub mod record;
pub mod results;

mod error;

pub use document::{DocumentKey, IndexedDocument, StoredDocument};
pub use error::{Error, Result};
pub use record::{RecordMetadata, SourceRecord};
pub use results::{MinimalSearchResult, SupportingContentRecord};
