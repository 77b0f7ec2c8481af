//! Blocking cache contract, the namespace-aware [`TokenStore`] facade, and built-in backends.
//!
//! A [`CacheBackend`] persists [`CacheEntry`] values by [`CacheKey`] and may offer advisory
//! per-key locks. [`TokenStore`] layers the read/write/delete options used by the lifecycle
//! manager on top of any backend: waiting for foreign locks before reading, acquiring the lock
//! for a read-modify-write sequence, and releasing it with the final write. Backends that cannot
//! lock keep the trait's default no-op lock methods, which downgrades race prevention to best
//! effort.

pub mod file;
pub mod lock;
pub mod memory;

mod facade;

pub use facade::*;
pub use file::FileStore;
pub use lock::{LockHolder, LockTable};
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenRecord},
};

/// Boxed future returned by [`CacheBackend`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token caches.
pub trait CacheBackend
where
	Self: Send + Sync,
{
	/// Fetches the entry stored under `key`, expired or not.
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>>;

	/// Persists or replaces the entry stored under `key`.
	fn save<'a>(&'a self, key: &'a CacheKey, entry: CacheEntry) -> StoreFuture<'a, ()>;

	/// Removes the entry stored under `key`, returning whether one existed.
	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool>;

	/// Acquires the advisory lock for `key` on behalf of `holder`.
	///
	/// Returns `false` when another holder keeps the lock and `wait` is off (or the wait timed
	/// out). Acquiring a lock the holder already owns succeeds without side effects.
	fn block<'a>(
		&'a self,
		key: &'a CacheKey,
		holder: LockHolder,
		wait: bool,
	) -> StoreFuture<'a, bool> {
		let _ = (key, holder, wait);

		Box::pin(async { Ok(true) })
	}

	/// Releases the lock for `key` if `holder` owns it.
	fn unblock<'a>(&'a self, key: &'a CacheKey, holder: LockHolder) -> StoreFuture<'a, bool> {
		let _ = (key, holder);

		Box::pin(async { Ok(true) })
	}

	/// Suspends until no other holder keeps the lock for `key`.
	///
	/// Returns `false` if the wait gave up before the lock was released.
	fn wait<'a>(&'a self, key: &'a CacheKey, holder: LockHolder) -> StoreFuture<'a, bool> {
		let _ = (key, holder);

		Box::pin(async { Ok(true) })
	}
}

/// Stored form of a record together with its absolute expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Persisted record.
	pub record: TokenRecord,
	/// Expiry as Unix seconds; `None` never expires.
	pub expires_at: Option<i64>,
}
impl CacheEntry {
	/// Wraps a record that expires `ttl` after `now`.
	pub fn new(record: TokenRecord, ttl: Option<Duration>, now: OffsetDateTime) -> Self {
		let expires_at =
			ttl.map(|ttl| now.unix_timestamp().saturating_add(ttl.whole_seconds().max(0)));

		Self { record, expires_at }
	}

	/// Returns true once `now` reached the expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now.unix_timestamp() >= expires_at)
	}
}

/// Error type produced by [`CacheBackend`] implementations and the [`TokenStore`] facade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// No backend is registered under the namespace.
	#[error("Cache namespace `{namespace}` is not configured.")]
	UnknownNamespace {
		/// Requested namespace name.
		namespace: String,
	},
	/// The lock for the key could not be acquired.
	#[error("Lock for `{key}` is held by another caller.")]
	LockUnavailable {
		/// Contended key.
		key: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn cache_entry_expiry_is_inclusive() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let entry = CacheEntry::new(TokenRecord::default(), Some(Duration::minutes(1)), now);

		assert!(!entry.is_expired_at(now + Duration::seconds(59)));
		assert!(entry.is_expired_at(now + Duration::minutes(1)));

		let forever = CacheEntry::new(TokenRecord::default(), None, now);

		assert!(!forever.is_expired_at(now + Duration::days(10_000)));
	}

	#[test]
	fn cache_entry_serializes_as_json() {
		let entry = CacheEntry { record: TokenRecord::default(), expires_at: Some(42) };
		let payload = serde_json::to_string(&entry).expect("CacheEntry should serialize to JSON.");
		let round_trip: CacheEntry =
			serde_json::from_str(&payload).expect("Serialized entry should deserialize.");

		assert_eq!(round_trip, entry);
	}
}
