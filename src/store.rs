//! Revocation store contract and built-in backends.
//!
//! Only the exception list is stored: tokens explicitly logged out before their natural expiry.
//! Live sessions are never tracked server-side.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::RevokedTokenRecord};

/// Boxed future returned by [`RevocationStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable record of revoked session tokens.
pub trait RevocationStore
where
	Self: Send + Sync,
{
	/// Persists `record`. Revoking an already revoked token keeps the original record.
	fn revoke(&self, record: RevokedTokenRecord) -> StoreFuture<'_, ()>;

	/// Exact-match membership test on the encoded token.
	fn is_revoked<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool>;

	/// Deletes records whose token would have expired by `now`; returns how many were removed.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;

	/// Revokes `token` as of `now`, reading its expiry from the token itself.
	fn revoke_token<'a>(&'a self, token: &'a str, now: OffsetDateTime) -> StoreFuture<'a, ()> {
		self.revoke(RevokedTokenRecord::for_token(token, now))
	}
}

/// Error type produced by [`RevocationStore`] implementations.
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
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_gate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let gate_error: Error = store_error.clone().into();

		assert!(matches!(gate_error, Error::Storage(_)));
		assert!(gate_error.to_string().contains("database unreachable"));

		let source = StdError::source(&gate_error)
			.expect("Gate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
