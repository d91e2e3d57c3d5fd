//! Signed payload carried by every session token.

// self
use crate::{
	_prelude::*,
	auth::{Principal, RoleSet, Subject},
};

/// What a session token may be presented for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
	/// Bearer credential for API calls.
	Access,
	/// Long-lived token handed back at logout; never a bearer credential.
	Refresh,
}

/// JWT payload for session tokens.
///
/// Timestamps are whole seconds since the Unix epoch, as in any JWT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
	/// Caller identifier.
	pub sub: Subject,
	/// Comma-joined role claim.
	pub roles: RoleSet,
	/// Issued-at, in Unix seconds.
	pub iat: i64,
	/// Expiry, in Unix seconds.
	pub exp: i64,
	/// Random token id keeping tokens issued in the same second distinct.
	pub jti: String,
	/// Access or refresh.
	pub token_use: TokenUse,
}
impl SessionClaims {
	/// Builds claims for `token_use` valid for `window` starting at `issued_at`.
	pub fn new(
		subject: Subject,
		roles: RoleSet,
		token_use: TokenUse,
		issued_at: OffsetDateTime,
		window: Duration,
	) -> Self {
		let iat = issued_at.unix_timestamp();

		Self {
			sub: subject,
			roles,
			iat,
			exp: iat.saturating_add(window.whole_seconds()),
			jti: format!("{:032x}", rand::random::<u128>()),
			token_use,
		}
	}

	/// Issued-at instant, if representable.
	pub fn issued_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.iat).ok()
	}

	/// Expiry instant, if representable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}

	/// Strict validity check: the token is live only while `now < exp`.
	pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
		now.unix_timestamp() < self.exp
	}

	/// Consumes the claims and returns the identity they describe.
	pub fn into_principal(self) -> Principal {
		Principal::new(self.sub, self.roles)
	}
}
