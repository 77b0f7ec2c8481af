//! File-backed [`CacheBackend`] for lightweight single-process deployments.
//!
//! Locks are not supported; the trait's no-op lock methods apply, so concurrent refreshes are
//! only prevented on a best-effort basis.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::CacheKey,
	store::{CacheBackend, CacheEntry, StoreError, StoreFuture},
};

type Snapshot = HashMap<CacheKey, CacheEntry>;

/// Persists cache entries to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Drops every entry that expired before `now` and persists the result.
	pub fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
		let mut guard = self.inner.write();
		let before = guard.len();

		guard.retain(|_, entry| !entry.is_expired_at(now));

		let purged = before - guard.len();

		if purged > 0 {
			self.persist_locked(&guard)?;
		}

		Ok(purged)
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::new());
		}

		let entries: Vec<(CacheKey, CacheEntry)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	// Writes a sorted snapshot to a sibling temp file, then renames it over the original.
	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		let mut snapshot = contents.iter().collect::<Vec<_>>();

		snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CacheBackend for FileStore {
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, entry: CacheEntry) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(key.clone(), entry);

			self.persist_locked(&guard)
		})
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(key).is_none() {
				return Ok(false);
			}

			self.persist_locked(&guard)?;

			Ok(true)
		})
	}
}
