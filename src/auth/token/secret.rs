//! Redacting wrappers for bearer tokens and the process-wide signing secret.

// self
use crate::_prelude::*;

/// Minimum signing secret length accepted for HMAC-SHA-512.
pub const MIN_SIGNING_SECRET_LEN: usize = 32;

/// Encoded session token; formatters never print the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps an encoded token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the encoded token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Symmetric key used to sign and verify every session token.
///
/// Fixed for the lifetime of the process; replacing it invalidates all outstanding tokens.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct SigningSecret(Arc<[u8]>);
impl SigningSecret {
	/// Wraps raw key material.
	pub fn new(value: impl AsRef<[u8]>) -> Self {
		Self(Arc::from(value.as_ref()))
	}

	/// Returns the key bytes. Callers must avoid logging them.
	pub fn expose(&self) -> &[u8] {
		&self.0
	}

	/// Key length in bytes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no key material is present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for SigningSecret {
	fn from(value: String) -> Self {
		Self::new(value.as_bytes())
	}
}
impl Debug for SigningSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SigningSecret").field(&"<redacted>").finish()
	}
}
