mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, env, future::Future, thread, time::Duration};

use qdrant_client::Qdrant;
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const MAX_DELETE_ATTEMPTS: u32 = 6;

/// A uniquely named Qdrant collection that is deleted when the value goes away.
pub struct TestCollection {
	url: String,
	name: String,
	cleaned: bool,
}
impl TestCollection {
	pub fn new(url: &str, prefix: &str) -> Self {
		Self {
			url: url.to_string(),
			name: format!("{prefix}_{}", Uuid::new_v4().simple()),
			cleaned: false,
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		delete_collections(&self.url, &[self.name.clone()]).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let collections = vec![self.name.clone()];
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(delete_collections(&url, &collections)) {
				eprintln!("Test collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("CLINOTE_QDRANT_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Runs `f` against a fresh collection and removes the collection afterwards, even when `f`
/// fails.
pub async fn with_test_collection<F, Fut, T>(url: &str, prefix: &str, f: F) -> Result<T>
where
	F: FnOnce(&TestCollection) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let collection = TestCollection::new(url, prefix);
	let result = f(&collection).await;
	let mut collection = collection;

	if let Err(err) = collection.cleanup_inner().await {
		eprintln!("Test collection cleanup warning: {err}.");

		if result.is_ok() {
			return Err(err);
		}
	}

	result
}

async fn delete_collections(url: &str, collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let client = Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let mut remaining = collections.iter().cloned().collect::<HashSet<_>>();
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=MAX_DELETE_ATTEMPTS {
		let existing = time::timeout(Duration::from_secs(10), client.list_collections())
			.await
			.map_err(|_| Error::Message("Qdrant list_collections timed out.".to_string()))?
			.map_err(|err| Error::Message(format!("Failed to list Qdrant collections: {err}.")))?;
		let existing = existing.collections.into_iter().map(|c| c.name).collect::<HashSet<_>>();

		remaining.retain(|collection| existing.contains(collection));

		if remaining.is_empty() {
			return Ok(());
		}

		for collection in remaining.iter().cloned().collect::<Vec<_>>() {
			let result =
				time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
					.await;

			match result {
				Ok(Ok(_)) => {},
				Ok(Err(err)) =>
					if attempt == MAX_DELETE_ATTEMPTS {
						return Err(Error::Message(format!(
							"Failed to delete Qdrant collection {collection:?} after {attempt} attempts: {err}."
						)));
					},
				Err(_) =>
					if attempt == MAX_DELETE_ATTEMPTS {
						return Err(Error::Message(format!(
							"Timed out deleting Qdrant collection {collection:?} after {attempt} attempts."
						)));
					},
			}
		}

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collection_names_are_unique_and_prefixed() {
		let mut a = TestCollection::new("http://localhost:6334", "t");
		let mut b = TestCollection::new("http://localhost:6334", "t");

		// Nothing was created, so skip the remote cleanup on drop.
		a.cleaned = true;
		b.cleaned = true;

		assert!(a.name().starts_with("t_"));
		assert_ne!(a.name(), b.name());
	}
}
