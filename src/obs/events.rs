//! Structured log events for security-relevant gate decisions.
//!
//! Token values are never logged; only causes, subjects, and client keys.

// self
use crate::{
	auth::{Subject, TokenRejection},
	gate::RevocationFailurePolicy,
	identity::ClientKey,
	store::StoreError,
};

/// A presented token failed verification; the request continues anonymously.
pub fn token_rejected(client: &ClientKey, cause: TokenRejection) {
	#[cfg(feature = "tracing")]
	tracing::debug!(client = %client, cause = cause.as_str(), "bearer token rejected");
	#[cfg(not(feature = "tracing"))]
	let _ = (client, cause);
}

/// A cryptographically valid but revoked token was presented.
pub fn revoked_token_presented(client: &ClientKey, subject: &Subject) {
	#[cfg(feature = "tracing")]
	tracing::warn!(client = %client, subject = %subject, "revoked bearer token presented");
	#[cfg(not(feature = "tracing"))]
	let _ = (client, subject);
}

/// The revocation store could not answer; `policy` decides what happens next.
pub fn revocation_lookup_failed(
	client: &ClientKey,
	error: &StoreError,
	policy: RevocationFailurePolicy,
) {
	#[cfg(feature = "tracing")]
	tracing::error!(
		client = %client,
		error = %error,
		policy = policy.as_str(),
		"revocation lookup failed"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (client, error, policy);
}

/// A client exhausted its bucket. Routine, so only traced.
pub fn request_throttled(client: &ClientKey, retry_after_seconds: u64) {
	#[cfg(feature = "tracing")]
	tracing::trace!(client = %client, retry_after_seconds, "request throttled");
	#[cfg(not(feature = "tracing"))]
	let _ = (client, retry_after_seconds);
}

/// The `exp` claim of a token being revoked could not be read.
pub fn expiry_peek_failed(path: String) {
	#[cfg(feature = "tracing")]
	tracing::debug!(path = %path, "token expiry unreadable, applying fallback retention");
	#[cfg(not(feature = "tracing"))]
	let _ = path;
}

/// Login was refused because the credentials did not match an account.
pub fn login_rejected() {
	#[cfg(feature = "tracing")]
	tracing::info!("login rejected");
}

/// A token pair was issued for `subject`.
pub fn session_opened(subject: &Subject) {
	#[cfg(feature = "tracing")]
	tracing::info!(subject = %subject, "session opened");
	#[cfg(not(feature = "tracing"))]
	let _ = subject;
}

/// The session tokens of `subject` were revoked.
pub fn session_closed(subject: &Subject) {
	#[cfg(feature = "tracing")]
	tracing::info!(subject = %subject, "session closed");
	#[cfg(not(feature = "tracing"))]
	let _ = subject;
}
