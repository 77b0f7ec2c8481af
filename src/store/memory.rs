//! Thread-safe in-memory [`CacheBackend`] with real per-key locks.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::CacheKey,
	store::{CacheBackend, CacheEntry, LockHolder, LockTable, StoreError, StoreFuture},
};

type EntryMap = Arc<RwLock<HashMap<CacheKey, CacheEntry>>>;

/// Storage backend that keeps entries in-process for tests, demos, and single-node deployments.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: EntryMap,
	locks: Arc<LockTable>,
}
impl MemoryStore {
	/// Creates a store whose lock waits and lock lifetimes are bounded by `timeout`.
	pub fn with_lock_timeout(timeout: StdDuration) -> Self {
		Self { entries: Default::default(), locks: Arc::new(LockTable::with_timeout(timeout)) }
	}

	/// Lock table guarding this store's keys.
	pub fn locks(&self) -> &LockTable {
		&self.locks
	}

	/// Number of stored entries, expired ones included.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
impl CacheBackend for MemoryStore {
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>> {
		Box::pin(async move { Ok(self.entries.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, entry: CacheEntry) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.entries.write().insert(key.clone(), entry);

			Ok::<_, StoreError>(())
		})
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.entries.write().remove(key).is_some()) })
	}

	fn block<'a>(
		&'a self,
		key: &'a CacheKey,
		holder: LockHolder,
		wait: bool,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.locks.block(key, holder, wait).await) })
	}

	fn unblock<'a>(&'a self, key: &'a CacheKey, holder: LockHolder) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.locks.unblock(key, holder)) })
	}

	fn wait<'a>(&'a self, key: &'a CacheKey, holder: LockHolder) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.locks.wait(key, holder).await) })
	}
}
