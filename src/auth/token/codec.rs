//! HMAC-SHA-512 session token issuance and verification.
//!
//! Tokens are compact JWTs (`header.payload.signature`) whose payload is [`SessionClaims`].
//! Verification needs nothing but the process-wide [`SigningSecret`]; no session state is
//! stored anywhere. Expiry is checked with a strict `now < exp` comparison and no leeway.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	auth::{Principal, RoleSet, SessionClaims, SigningSecret, Subject, TokenSecret, TokenUse},
};

/// Reason a presented token was not accepted.
///
/// Causes exist for server-side diagnostics only; callers always see one "unauthenticated"
/// outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum TokenRejection {
	/// Nothing was presented after the scheme.
	#[error("Token is empty.")]
	Empty,
	/// The token is not a well-formed compact JWT with the expected claims.
	#[error("Token is malformed.")]
	Malformed,
	/// The signature does not match the current secret.
	#[error("Token signature is invalid.")]
	BadSignature,
	/// The token reached its expiry instant.
	#[error("Token has expired.")]
	Expired,
	/// The token uses an algorithm or format this codec does not accept.
	#[error("Token format is unsupported.")]
	Unsupported,
	/// A valid token presented for the wrong purpose, such as a refresh token used as a bearer.
	#[error("Token was issued for another use.")]
	WrongUse,
}
impl TokenRejection {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenRejection::Empty => "empty",
			TokenRejection::Malformed => "malformed",
			TokenRejection::BadSignature => "bad_signature",
			TokenRejection::Expired => "expired",
			TokenRejection::Unsupported => "unsupported",
			TokenRejection::WrongUse => "wrong_use",
		}
	}
}
impl From<jsonwebtoken::errors::Error> for TokenRejection {
	fn from(e: jsonwebtoken::errors::Error) -> Self {
		match e.kind() {
			ErrorKind::InvalidSignature => Self::BadSignature,
			ErrorKind::ExpiredSignature => Self::Expired,
			ErrorKind::InvalidAlgorithm
			| ErrorKind::InvalidAlgorithmName
			| ErrorKind::MissingAlgorithm => Self::Unsupported,
			_ => Self::Malformed,
		}
	}
}

/// Access and refresh tokens issued together at login.
#[derive(Clone, Debug)]
pub struct TokenPair {
	/// Short-lived access token.
	pub access_token: TokenSecret,
	/// Long-lived refresh token.
	pub refresh_token: TokenSecret,
	/// Validity window of the access token.
	pub access_expires_in: Duration,
}

/// Issues and verifies signed session tokens with a single symmetric secret.
#[derive(Clone)]
pub struct TokenCodec {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
	access_ttl: Duration,
	refresh_ttl: Duration,
}
impl TokenCodec {
	const ALGORITHM: Algorithm = Algorithm::HS512;

	/// Creates a codec for the provided secret and the system-wide access/refresh windows.
	pub fn new(secret: &SigningSecret, access_ttl: Duration, refresh_ttl: Duration) -> Self {
		let mut validation = Validation::new(Self::ALGORITHM);

		// Expiry is enforced by `SessionClaims::is_live_at`, without leeway.
		validation.validate_exp = false;
		validation.validate_aud = false;
		validation.set_required_spec_claims(&["exp", "sub"]);

		Self {
			encoding: EncodingKey::from_secret(secret.expose()),
			decoding: DecodingKey::from_secret(secret.expose()),
			validation,
			access_ttl,
			refresh_ttl,
		}
	}

	/// Access token window.
	pub fn access_ttl(&self) -> Duration {
		self.access_ttl
	}

	/// Refresh token window.
	pub fn refresh_ttl(&self) -> Duration {
		self.refresh_ttl
	}

	/// Signs an access token for `subject` valid for `window` from now.
	pub fn issue(&self, subject: &Subject, roles: &RoleSet, window: Duration) -> Result<TokenSecret> {
		self.issue_at(subject, roles, window, OffsetDateTime::now_utc())
	}

	/// Signs an access token for `subject` valid for `window` from `now`.
	pub fn issue_at(
		&self,
		subject: &Subject,
		roles: &RoleSet,
		window: Duration,
		now: OffsetDateTime,
	) -> Result<TokenSecret> {
		self.sign(&SessionClaims::new(subject.clone(), roles.clone(), TokenUse::Access, now, window))
	}

	fn sign(&self, claims: &SessionClaims) -> Result<TokenSecret> {
		let encoded = jsonwebtoken::encode(&Header::new(Self::ALGORITHM), claims, &self.encoding)
			.map_err(|source| Error::Signing { source })?;

		Ok(TokenSecret::new(encoded))
	}

	/// Issues the access + refresh pair handed out at login.
	pub fn issue_pair(&self, subject: &Subject, roles: &RoleSet) -> Result<TokenPair> {
		self.issue_pair_at(subject, roles, OffsetDateTime::now_utc())
	}

	/// Issues the access + refresh pair as of `now`.
	pub fn issue_pair_at(
		&self,
		subject: &Subject,
		roles: &RoleSet,
		now: OffsetDateTime,
	) -> Result<TokenPair> {
		Ok(TokenPair {
			access_token: self.issue_at(subject, roles, self.access_ttl, now)?,
			refresh_token: self.sign(&SessionClaims::new(
				subject.clone(),
				roles.clone(),
				TokenUse::Refresh,
				now,
				self.refresh_ttl,
			))?,
			access_expires_in: self.access_ttl,
		})
	}

	/// Verifies `token` against the current clock.
	pub fn verify(&self, token: &str) -> Result<Principal, TokenRejection> {
		self.verify_at(token, OffsetDateTime::now_utc())
	}

	/// Verifies access token `token` as of `now` and returns the identity it carries.
	///
	/// Refresh tokens are rejected with [`TokenRejection::WrongUse`].
	pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Principal, TokenRejection> {
		self.verify_use_at(token, TokenUse::Access, now)
	}

	/// Verifies refresh token `token` as of `now`.
	pub fn verify_refresh_at(
		&self,
		token: &str,
		now: OffsetDateTime,
	) -> Result<Principal, TokenRejection> {
		self.verify_use_at(token, TokenUse::Refresh, now)
	}

	fn verify_use_at(
		&self,
		token: &str,
		expected: TokenUse,
		now: OffsetDateTime,
	) -> Result<Principal, TokenRejection> {
		let claims = self.decode_at(token, now)?;

		if claims.token_use != expected {
			return Err(TokenRejection::WrongUse);
		}

		Ok(claims.into_principal())
	}

	/// Verifies `token` as of `now`, whatever its use, and returns its full claims.
	pub fn decode_at(&self, token: &str, now: OffsetDateTime) -> Result<SessionClaims, TokenRejection> {
		let token = token.trim();

		if token.is_empty() {
			return Err(TokenRejection::Empty);
		}

		let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)?;

		if !data.claims.is_live_at(now) {
			return Err(TokenRejection::Expired);
		}

		Ok(data.claims)
	}

	/// Reads the `exp` claim without checking the signature.
	///
	/// Only suitable for bookkeeping such as revocation retention; never for trust decisions.
	pub fn peek_expiry(token: &str) -> Option<OffsetDateTime> {
		#[derive(Deserialize)]
		struct ExpiryClaim {
			exp: i64,
		}

		let mut segments = token.trim().split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return None;
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let claim: ExpiryClaim = serde_path_to_error::deserialize(&mut deserializer)
			.inspect_err(|e| crate::obs::expiry_peek_failed(e.path().to_string()))
			.ok()?;

		OffsetDateTime::from_unix_timestamp(claim.exp).ok()
	}
}
impl Debug for TokenCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCodec")
			.field("algorithm", &Self::ALGORITHM)
			.field("access_ttl", &self.access_ttl)
			.field("refresh_ttl", &self.refresh_ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const SECRET: &str = "marketplace-signing-secret-0123456789-abcdefghijklmnop";

	fn codec(secret: &str) -> TokenCodec {
		TokenCodec::new(&SigningSecret::new(secret), Duration::hours(1), Duration::days(7))
	}

	fn subject() -> Subject {
		Subject::new("shopper@example.com").expect("Subject fixture should be valid.")
	}

	fn roles() -> RoleSet {
		RoleSet::new(["ROLE_USER", "ROLE_OWNER"]).expect("Role fixture should be valid.")
	}

	#[test]
	fn issued_token_verifies_with_same_claims() {
		let codec = codec(SECRET);
		let token = codec
			.issue(&subject(), &roles(), Duration::minutes(5))
			.expect("Token issuance should succeed.");
		let principal = codec.verify(token.expose()).expect("Fresh token should verify.");

		assert_eq!(principal.subject, subject());
		assert_eq!(principal.roles, roles());
	}

	#[test]
	fn expiry_boundary_is_exclusive() {
		let codec = codec(SECRET);
		let issued = macros::datetime!(2025-06-01 08:00 UTC);
		let token = codec
			.issue_at(&subject(), &roles(), Duration::seconds(30), issued)
			.expect("Token issuance should succeed.");

		assert!(codec.verify_at(token.expose(), issued + Duration::seconds(29)).is_ok());
		assert_eq!(
			codec.verify_at(token.expose(), issued + Duration::seconds(30)),
			Err(TokenRejection::Expired)
		);
		assert_eq!(
			codec.verify_at(token.expose(), issued + Duration::hours(3)),
			Err(TokenRejection::Expired)
		);
	}

	#[test]
	fn different_secret_fails_signature() {
		let token = codec(SECRET)
			.issue(&subject(), &roles(), Duration::minutes(5))
			.expect("Token issuance should succeed.");
		let rotated = codec("rotated-signing-secret-0123456789-abcdefghijklmnopqrs");

		assert_eq!(rotated.verify(token.expose()), Err(TokenRejection::BadSignature));
	}

	#[test]
	fn failure_causes_are_distinguished() {
		let codec = codec(SECRET);

		assert_eq!(codec.verify(""), Err(TokenRejection::Empty));
		assert_eq!(codec.verify("   "), Err(TokenRejection::Empty));
		assert_eq!(codec.verify("not-a-token"), Err(TokenRejection::Malformed));

		let hs256 = jsonwebtoken::encode(
			&Header::new(Algorithm::HS256),
			&SessionClaims::new(
				subject(),
				roles(),
				TokenUse::Access,
				OffsetDateTime::now_utc(),
				Duration::hours(1),
			),
			&EncodingKey::from_secret(SECRET.as_bytes()),
		)
		.expect("HS256 fixture should encode.");

		assert_eq!(codec.verify(&hs256), Err(TokenRejection::Unsupported));
	}

	#[test]
	fn tampered_payload_is_rejected() {
		let codec = codec(SECRET);
		let token = codec
			.issue(&subject(), &roles(), Duration::minutes(5))
			.expect("Token issuance should succeed.");
		let mut parts: Vec<&str> = token.expose().split('.').collect();
		let forged = URL_SAFE_NO_PAD.encode(
			br#"{"sub":"admin@example.com","roles":"ROLE_ADMIN","iat":0,"exp":99999999999,"jti":"x","token_use":"access"}"#,
		);

		parts[1] = forged.as_str();

		assert_eq!(codec.verify(&parts.join(".")), Err(TokenRejection::BadSignature));
	}

	#[test]
	fn pair_shares_claims_with_different_expiry() {
		let codec = codec(SECRET);
		let now = macros::datetime!(2025-06-01 08:00 UTC);
		let pair = codec.issue_pair_at(&subject(), &roles(), now).expect("Pair should be issued.");
		let access = codec
			.decode_at(pair.access_token.expose(), now)
			.expect("Access token should verify.");
		let refresh = codec
			.decode_at(pair.refresh_token.expose(), now)
			.expect("Refresh token should verify.");

		assert_eq!(access.sub, refresh.sub);
		assert_eq!(access.roles, refresh.roles);
		assert_eq!(access.token_use, TokenUse::Access);
		assert_eq!(refresh.token_use, TokenUse::Refresh);
		assert_eq!(access.expires_at(), Some(now + Duration::hours(1)));
		assert_eq!(refresh.expires_at(), Some(now + Duration::days(7)));
		assert_eq!(pair.access_expires_in, Duration::hours(1));
	}

	#[test]
	fn refresh_token_is_not_a_bearer_credential() {
		let codec = codec(SECRET);
		let now = macros::datetime!(2025-06-01 08:00 UTC);
		let pair = codec.issue_pair_at(&subject(), &roles(), now).expect("Pair should be issued.");

		assert_eq!(codec.verify_at(pair.refresh_token.expose(), now), Err(TokenRejection::WrongUse));
		assert_eq!(
			codec.verify_refresh_at(pair.access_token.expose(), now),
			Err(TokenRejection::WrongUse)
		);

		let owner = codec
			.verify_refresh_at(pair.refresh_token.expose(), now)
			.expect("Refresh token should verify as a refresh token.");

		assert_eq!(owner.subject, subject());
	}

	#[test]
	fn peek_reads_expiry_without_verification() {
		let now = macros::datetime!(2025-06-01 08:00 UTC);
		let token = codec(SECRET)
			.issue_at(&subject(), &roles(), Duration::minutes(15), now)
			.expect("Token issuance should succeed.");

		assert_eq!(TokenCodec::peek_expiry(token.expose()), Some(now + Duration::minutes(15)));
		assert_eq!(TokenCodec::peek_expiry("garbage"), None);
		assert_eq!(TokenCodec::peek_expiry("a.b.c"), None);
		assert_eq!(TokenCodec::peek_expiry("a.b.c.d"), None);
	}
}
