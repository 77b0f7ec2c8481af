// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenRecord},
	obs,
	store::{CacheBackend, CacheEntry, LockHolder, StoreError},
};

/// Locking behavior of [`TokenStore::read`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
	/// Wait for a foreign lock before reading (or while acquiring it when `block` is set).
	pub wait: bool,
	/// Acquire the key's lock for a read-modify-write sequence.
	pub block: bool,
}
impl ReadOptions {
	/// Acquires the lock without waiting; fails with [`StoreError::LockUnavailable`] when taken.
	pub const fn try_block() -> Self {
		Self { wait: false, block: true }
	}

	/// Acquires the lock, waiting for the current holder to release it.
	pub const fn block() -> Self {
		Self { wait: true, block: true }
	}
}
impl Default for ReadOptions {
	fn default() -> Self {
		Self { wait: true, block: false }
	}
}

/// Locking behavior of [`TokenStore::write`] and [`TokenStore::delete`].
///
/// The default waits for a foreign lock without taking it, then releases any lock the caller
/// already holds. [`locked`](Self::locked) acquires the lock first, which is what read-modify-write
/// transitions use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
	/// Wait for a foreign lock while acquiring it.
	pub wait: bool,
	/// Acquire the key's lock before mutating.
	pub block: bool,
	/// Release the lock once the mutation finished (even if it failed).
	pub unblock: bool,
}
impl WriteOptions {
	/// Acquires the key's lock (waiting for foreign holders) before mutating.
	pub fn locked() -> Self {
		Self { block: true, ..Default::default() }
	}
}
impl Default for WriteOptions {
	fn default() -> Self {
		Self { wait: true, block: false, unblock: true }
	}
}

/// Namespace-aware cache facade used by the lifecycle manager.
#[derive(Clone, Default)]
pub struct TokenStore {
	namespaces: HashMap<String, Arc<dyn CacheBackend>>,
}
impl TokenStore {
	/// Creates a store without namespaces.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers (or replaces) the backend serving `namespace`.
	pub fn with_namespace(
		mut self,
		namespace: impl Into<String>,
		backend: Arc<dyn CacheBackend>,
	) -> Self {
		self.namespaces.insert(namespace.into(), backend);

		self
	}

	/// Returns the backend serving `namespace`.
	pub fn backend(&self, namespace: &str) -> Result<&Arc<dyn CacheBackend>, StoreError> {
		self.namespaces
			.get(namespace)
			.ok_or_else(|| StoreError::UnknownNamespace { namespace: namespace.into() })
	}

	/// Reads the record stored under `key`, treating expired entries as absent.
	///
	/// With `block` set the lock stays held by `holder` after a successful read; the caller
	/// releases it with a later [`write`](Self::write) or [`unblock`](Self::unblock).
	pub async fn read(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
		options: ReadOptions,
	) -> Result<Option<TokenRecord>, StoreError> {
		let backend = self.backend(namespace)?;

		if options.block {
			if !backend.block(key, holder, options.wait).await? {
				return Err(StoreError::LockUnavailable { key: key.to_string() });
			}
		} else if options.wait && !backend.wait(key, holder).await? {
			obs::lock_wait_timed_out(namespace, key);
		}

		match Self::load_live(backend.as_ref(), key).await {
			Ok(record) => Ok(record),
			Err(e) => {
				if options.block {
					backend.unblock(key, holder).await?;
				}

				Err(e)
			},
		}
	}

	/// Persists `record` under `key`, expiring it `ttl` from now.
	pub async fn write(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
		record: TokenRecord,
		ttl: Option<Duration>,
		options: WriteOptions,
	) -> Result<(), StoreError> {
		let backend = self.backend(namespace)?;

		Self::acquire(backend.as_ref(), key, holder, options).await?;

		let entry = CacheEntry::new(record, ttl, OffsetDateTime::now_utc());
		let saved = backend.save(key, entry).await;

		Self::release(backend.as_ref(), key, holder, options).await?;

		saved
	}

	/// Removes the entry stored under `key`, returning whether one existed.
	pub async fn delete(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
		options: WriteOptions,
	) -> Result<bool, StoreError> {
		let backend = self.backend(namespace)?;

		Self::acquire(backend.as_ref(), key, holder, options).await?;

		let removed = backend.remove(key).await;

		Self::release(backend.as_ref(), key, holder, options).await?;

		removed
	}

	/// Acquires the lock for `key`; see [`CacheBackend::block`].
	pub async fn block(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
		wait: bool,
	) -> Result<bool, StoreError> {
		self.backend(namespace)?.block(key, holder, wait).await
	}

	/// Releases the lock for `key` if `holder` owns it.
	pub async fn unblock(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
	) -> Result<bool, StoreError> {
		self.backend(namespace)?.unblock(key, holder).await
	}

	/// Suspends until no other holder keeps the lock for `key`.
	pub async fn wait(
		&self,
		namespace: &str,
		key: &CacheKey,
		holder: LockHolder,
	) -> Result<bool, StoreError> {
		let released = self.backend(namespace)?.wait(key, holder).await?;

		if !released {
			obs::lock_wait_timed_out(namespace, key);
		}

		Ok(released)
	}

	async fn load_live(
		backend: &dyn CacheBackend,
		key: &CacheKey,
	) -> Result<Option<TokenRecord>, StoreError> {
		match backend.load(key).await? {
			Some(entry) if entry.is_expired_at(OffsetDateTime::now_utc()) => {
				backend.remove(key).await?;

				Ok(None)
			},
			Some(entry) => Ok(Some(entry.record)),
			None => Ok(None),
		}
	}

	async fn acquire(
		backend: &dyn CacheBackend,
		key: &CacheKey,
		holder: LockHolder,
		options: WriteOptions,
	) -> Result<(), StoreError> {
		if options.block {
			if !backend.block(key, holder, options.wait).await? {
				return Err(StoreError::LockUnavailable { key: key.to_string() });
			}
		} else if options.wait && !backend.wait(key, holder).await? {
			return Err(StoreError::LockUnavailable { key: key.to_string() });
		}

		Ok(())
	}

	async fn release(
		backend: &dyn CacheBackend,
		key: &CacheKey,
		holder: LockHolder,
		options: WriteOptions,
	) -> Result<(), StoreError> {
		if options.unblock {
			backend.unblock(key, holder).await?;
		}

		Ok(())
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut namespaces = self.namespaces.keys().collect::<Vec<_>>();

		namespaces.sort();

		f.debug_struct("TokenStore").field("namespaces", &namespaces).finish()
	}
}
