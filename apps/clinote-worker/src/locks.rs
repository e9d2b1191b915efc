use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per record id, so syncs of the same record never overlap.
#[derive(Default)]
pub struct RecordLocks {
	locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}
impl RecordLocks {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn lock(&self, record_id: i64) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

			// Entries nobody holds or waits on can go.
			locks.retain(|_, lock| Arc::strong_count(lock) > 1);

			locks.entry(record_id).or_default().clone()
		};

		lock.lock_owned().await
	}

	pub fn len(&self) -> usize {
		self.locks.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn same_record_waits_for_the_holder() {
		let locks = Arc::new(RecordLocks::new());
		let held = locks.lock(42).await;
		let waiter = {
			let locks = locks.clone();

			tokio::spawn(async move {
				let _guard = locks.lock(42).await;
			})
		};

		tokio::time::sleep(Duration::from_millis(20)).await;

		assert!(!waiter.is_finished());

		drop(held);

		waiter.await.expect("waiter panicked");
	}

	#[tokio::test]
	async fn different_records_do_not_block() {
		let locks = RecordLocks::new();
		let _first = locks.lock(1).await;
		let _second = locks.lock(2).await;

		assert_eq!(locks.len(), 2);
	}

	#[tokio::test]
	async fn released_entries_are_pruned() {
		let locks = RecordLocks::new();

		drop(locks.lock(1).await);

		let _other = locks.lock(2).await;

		assert_eq!(locks.len(), 1);
	}
}
