//! Thread-safe in-memory [`RevocationStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::RevokedTokenRecord,
	store::{RevocationStore, StoreError, StoreFuture},
};

type RevocationMap = Arc<RwLock<HashMap<String, RevokedTokenRecord>>>;

/// Keeps revoked tokens in-process; contents are lost on restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(RevocationMap);
impl MemoryStore {
	/// Number of records currently held.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been revoked.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn revoke_now(map: RevocationMap, record: RevokedTokenRecord) -> Result<(), StoreError> {
		map.write().entry(record.token.expose().to_owned()).or_insert(record);

		Ok(())
	}

	fn purge_now(map: RevocationMap, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, record| !record.is_inert_at(now));

		before - guard.len()
	}
}
impl RevocationStore for MemoryStore {
	fn revoke(&self, record: RevokedTokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::revoke_now(map, record) })
	}

	fn is_revoked<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.read().contains_key(token)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::purge_now(map, now)) })
	}
}
