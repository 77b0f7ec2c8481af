//! Advisory per-key locks for backends that can serialize read-modify-write sequences.

// std
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::{Duration as StdDuration, Instant},
};
// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{_prelude::*, auth::CacheKey, obs};

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

/// Identity of one logical caller holding (or waiting for) cache locks.
///
/// Each lifecycle operation draws a fresh holder, so repeated `block` calls within that
/// operation are re-entrant while other operations contend normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockHolder(u64);
impl LockHolder {
	/// Allocates a process-unique holder.
	pub fn next() -> Self {
		Self(NEXT_HOLDER.fetch_add(1, Ordering::Relaxed))
	}
}

struct HeldLock {
	holder: LockHolder,
	acquired_at: Instant,
	_guard: MutexGuardArc<()>,
}

/// In-process lock table keyed by [`CacheKey`].
///
/// Waiters queue on an async mutex per key, so they are served in arrival order. Waits give up
/// after the configured timeout, and a lock held longer than that timeout is treated as
/// abandoned and may be taken over by the next caller.
pub struct LockTable {
	slots: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
	held: Mutex<HashMap<CacheKey, HeldLock>>,
	timeout: StdDuration,
}
impl LockTable {
	/// Default bound for lock waits and lock lifetimes.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Creates a table with a custom wait/lifetime bound.
	pub fn with_timeout(timeout: StdDuration) -> Self {
		Self { slots: Default::default(), held: Default::default(), timeout }
	}

	/// Returns true if `holder` currently owns the lock for `key`.
	pub fn holds(&self, key: &CacheKey, holder: LockHolder) -> bool {
		self.held.lock().get(key).is_some_and(|lock| lock.holder == holder)
	}

	/// Returns true if anyone owns the lock for `key`.
	pub fn is_locked(&self, key: &CacheKey) -> bool {
		self.held.lock().contains_key(key)
	}

	/// Acquires the lock for `key`; see [`CacheBackend::block`](crate::store::CacheBackend::block).
	pub async fn block(&self, key: &CacheKey, holder: LockHolder, wait: bool) -> bool {
		if self.holds(key, holder) {
			return true;
		}

		self.take_over_abandoned(key);

		let slot = self.slot(key);
		let guard = match slot.try_lock_arc() {
			Some(guard) => Some(guard),
			None if wait => tokio::time::timeout(self.timeout, slot.lock_arc()).await.ok(),
			None => None,
		};

		drop(slot);

		match guard {
			Some(guard) => {
				self.held.lock().insert(
					key.clone(),
					HeldLock { holder, acquired_at: Instant::now(), _guard: guard },
				);

				true
			},
			None => false,
		}
	}

	/// Releases the lock for `key` if `holder` owns it; returns false if someone else does.
	pub fn unblock(&self, key: &CacheKey, holder: LockHolder) -> bool {
		let released = {
			let mut held = self.held.lock();

			match held.get(key) {
				Some(lock) if lock.holder == holder => held.remove(key),
				Some(_) => return false,
				None => None,
			}
		};

		drop(released);
		self.prune(key);

		true
	}

	/// Suspends until `key` is not locked by another holder. Returns false on timeout.
	pub async fn wait(&self, key: &CacheKey, holder: LockHolder) -> bool {
		if self.holds(key, holder) {
			return true;
		}

		self.take_over_abandoned(key);

		let slot = self.slot(key);
		let released = match slot.try_lock_arc() {
			Some(_guard) => true,
			None => tokio::time::timeout(self.timeout, slot.lock_arc()).await.is_ok(),
		};

		drop(slot);
		self.prune(key);

		released
	}

	fn slot(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		self.slots.lock().entry(key.clone()).or_default().clone()
	}

	fn take_over_abandoned(&self, key: &CacheKey) {
		let abandoned = {
			let mut held = self.held.lock();

			match held.get(key) {
				Some(lock) if lock.acquired_at.elapsed() >= self.timeout => held.remove(key),
				_ => None,
			}
		};

		if abandoned.is_some() {
			obs::abandoned_lock_released(key);
		}
	}

	// Drops the per-key mutex once nobody holds or waits on it.
	fn prune(&self, key: &CacheKey) {
		let mut slots = self.slots.lock();

		if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
			slots.remove(key);
		}
	}
}
impl Default for LockTable {
	fn default() -> Self {
		Self::with_timeout(Self::DEFAULT_TIMEOUT)
	}
}
impl Debug for LockTable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockTable")
			.field("held", &self.held.lock().len())
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{Environment, ServiceName};

	fn key() -> CacheKey {
		CacheKey::durable(
			&ServiceName::new("svc").expect("Service fixture should be valid."),
			&Environment::new("test").expect("Environment fixture should be valid."),
		)
	}

	#[tokio::test]
	async fn block_is_reentrant_and_exclusive() {
		let table = LockTable::default();
		let key = key();
		let owner = LockHolder::next();
		let other = LockHolder::next();

		assert!(table.block(&key, owner, false).await);
		assert!(table.block(&key, owner, false).await, "Re-blocking by the owner is a no-op.");
		assert!(!table.block(&key, other, false).await);
		assert!(!table.unblock(&key, other), "Only the owner may release the lock.");
		assert!(table.unblock(&key, owner));
		assert!(table.block(&key, other, false).await);
	}

	#[tokio::test]
	async fn wait_resumes_after_release() {
		let table = Arc::new(LockTable::default());
		let key = key();
		let owner = LockHolder::next();

		assert!(table.block(&key, owner, false).await);

		let waiter = {
			let table = Arc::clone(&table);
			let key = key.clone();

			tokio::spawn(async move { table.wait(&key, LockHolder::next()).await })
		};

		tokio::time::sleep(StdDuration::from_millis(20)).await;

		assert!(!waiter.is_finished(), "Waiter must block while the lock is held.");

		table.unblock(&key, owner);

		assert!(waiter.await.expect("Waiter task should not panic."));
		assert!(!table.is_locked(&key));
	}

	#[tokio::test]
	async fn waits_time_out_and_abandoned_locks_are_taken_over() {
		let table = LockTable::with_timeout(StdDuration::from_millis(30));
		let key = key();
		let owner = LockHolder::next();
		let other = LockHolder::next();

		assert!(table.block(&key, owner, false).await);
		assert!(!table.wait(&key, other).await, "Wait should give up after the timeout.");
		assert!(
			table.block(&key, other, false).await,
			"A lock older than the timeout counts as abandoned."
		);
		assert!(table.holds(&key, other));
		assert!(!table.holds(&key, owner));
	}
}
