//! File-backed [`RevocationStore`] that survives restarts on a single node.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::RevokedTokenRecord,
	store::{RevocationStore, StoreError, StoreFuture},
};

/// Persists the revocation list to a JSON file after each mutation.
///
/// The in-memory list only changes once the snapshot write succeeds, so a failed call leaves
/// the store as it was and can be retried.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<String, RevokedTokenRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing records.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<String, RevokedTokenRecord>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let records: Vec<RevokedTokenRecord> =
			serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
				StoreError::Serialization {
					message: format!("Failed to parse {} at `{}`: {}", path.display(), e.path(), e.inner()),
				}
			})?;

		Ok(records.into_iter().map(|record| (record.token.expose().to_owned(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<String, RevokedTokenRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize revocation snapshot: {e}"),
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
impl RevocationStore for FileStore {
	fn revoke(&self, record: RevokedTokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let key = record.token.expose().to_owned();

			if guard.contains_key(&key) {
				return Ok(());
			}

			guard.insert(key.clone(), record);

			if let Err(e) = self.persist_locked(&guard) {
				guard.remove(&key);

				return Err(e);
			}

			Ok(())
		})
	}

	fn is_revoked<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.inner.read().contains_key(token)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let retained: HashMap<_, _> = guard
				.iter()
				.filter(|(_, record)| !record.is_inert_at(now))
				.map(|(token, record)| (token.clone(), record.clone()))
				.collect();
			let removed = guard.len() - retained.len();

			if removed > 0 {
				self.persist_locked(&retained)?;
				*guard = retained;
			}

			Ok(removed)
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"admission_gate_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn revocations_survive_reopen() {
		let path = temp_path("reopen");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let now = macros::datetime!(2025-05-05 12:00 UTC);

		rt.block_on(store.revoke_token("opaque-token", now))
			.expect("Failed to revoke fixture token in file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(
			rt.block_on(reopened.is_revoked("opaque-token"))
				.expect("Lookup against reopened store should succeed.")
		);
		assert!(
			!rt.block_on(reopened.is_revoked("other-token"))
				.expect("Lookup against reopened store should succeed.")
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn purge_rewrites_snapshot() {
		let path = temp_path("purge");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let now = macros::datetime!(2025-05-05 12:00 UTC);

		rt.block_on(store.revoke_token("short-lived", now)).expect("Revocation should succeed.");

		let removed = rt
			.block_on(store.purge_expired(now + Duration::hours(2)))
			.expect("Purge should succeed.");

		assert_eq!(removed, 1);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(!rt.block_on(reopened.is_revoked("short-lived")).expect("Lookup should succeed."));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_write_leaves_store_unchanged() {
		let path = temp_path("blocked");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let now = macros::datetime!(2025-05-05 12:00 UTC);
		let blocker = path.with_extension("tmp");

		rt.block_on(store.revoke_token("kept", now)).expect("Revocation should succeed.");
		fs::create_dir(&blocker).expect("Blocking directory should be creatable.");

		let error = rt
			.block_on(store.revoke_token("pending", now))
			.expect_err("Revocation should fail while the temp file cannot be created.");

		assert!(matches!(error, StoreError::Backend { .. }));
		assert!(!rt.block_on(store.is_revoked("pending")).expect("Lookup should succeed."));
		assert!(rt.block_on(store.purge_expired(now + Duration::hours(2))).is_err());
		assert!(rt.block_on(store.is_revoked("kept")).expect("Lookup should succeed."));

		fs::remove_dir(&blocker).expect("Blocking directory should be removable.");
		rt.block_on(store.revoke_token("pending", now)).expect("Retried revocation should succeed.");

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(rt.block_on(reopened.is_revoked("pending")).expect("Lookup should succeed."));
		assert!(rt.block_on(reopened.is_revoked("kept")).expect("Lookup should succeed."));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_reports_serialization_error() {
		let path = temp_path("corrupt");

		fs::write(&path, b"[{\"token\": 5}]").expect("Fixture file should be writable.");

		let error = FileStore::open(&path).expect_err("Corrupt snapshot should fail to load.");

		assert!(matches!(error, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
