//! Revocation records kept for tokens invalidated before their natural expiry.

// self
use crate::{
	_prelude::*,
	auth::{TokenCodec, TokenSecret},
};

/// Retention applied when a revoked token's own expiry cannot be read.
pub const FALLBACK_RETENTION: Duration = Duration::hours(1);

/// Immutable record of one logged-out token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedTokenRecord {
	/// Exact encoded token; the lookup key.
	pub token: TokenSecret,
	/// Natural expiry copied from the token, or the fallback retention.
	pub expires_at: OffsetDateTime,
	/// Instant the token was revoked.
	pub revoked_at: OffsetDateTime,
}
impl RevokedTokenRecord {
	/// Builds a record for `token` revoked at `now`, reading the expiry from the token itself.
	pub fn for_token(token: impl Into<String>, now: OffsetDateTime) -> Self {
		let token = TokenSecret::new(token);
		let expires_at =
			TokenCodec::peek_expiry(token.expose()).unwrap_or(now + FALLBACK_RETENTION);

		Self { token, expires_at, revoked_at: now }
	}

	/// Returns `true` once the underlying token would have expired anyway.
	///
	/// Inert records may be pruned; keeping them is harmless.
	pub fn is_inert_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
impl Debug for RevokedTokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RevokedTokenRecord")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{RoleSet, SigningSecret, Subject};

	#[test]
	fn expiry_is_copied_from_token() {
		let now = macros::datetime!(2025-02-10 09:00 UTC);
		let codec = TokenCodec::new(
			&SigningSecret::new("record-test-secret-0123456789abcdefghijkl"),
			Duration::minutes(30),
			Duration::days(1),
		);
		let token = codec
			.issue_at(
				&Subject::new("7").expect("Subject fixture should be valid."),
				&RoleSet::new(["ROLE_USER"]).expect("Role fixture should be valid."),
				Duration::minutes(30),
				now,
			)
			.expect("Token issuance should succeed.");
		let record = RevokedTokenRecord::for_token(token.expose(), now);

		assert_eq!(record.expires_at, macros::datetime!(2025-02-10 09:30 UTC));
		assert_eq!(record.revoked_at, now);
		assert!(!record.is_inert_at(now));
		assert!(record.is_inert_at(macros::datetime!(2025-02-10 09:30 UTC)));
	}

	#[test]
	fn unparseable_token_falls_back_to_one_hour() {
		let now = macros::datetime!(2025-02-10 09:00 UTC);
		let record = RevokedTokenRecord::for_token("opaque", now);

		assert_eq!(record.expires_at, now + FALLBACK_RETENTION);
		assert!(format!("{record:?}").contains("<redacted>"));
	}
}
