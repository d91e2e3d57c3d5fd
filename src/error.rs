//! Gate-level error types shared across the codec, stores, sessions, and configuration.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// Token validation failures are deliberately absent: they are reported as
/// [`TokenRejection`](crate::auth::TokenRejection) values and never leave the gate as errors.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Signing a new session token failed.
	#[error("Session token could not be signed.")]
	Signing {
		/// Underlying signer failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Account directory rejected the supplied credentials.
	#[error("Credentials were rejected.")]
	InvalidCredentials,
	/// A bearer token was required but missing, invalid, or revoked.
	#[error("A valid bearer token is required.")]
	Unauthenticated,
}

/// Configuration and validation failures raised while loading [`GateConfig`](crate::config::GateConfig).
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The configuration file could not be read.
	#[error("Configuration file could not be read.")]
	Read(#[from] std::io::Error),
	/// The configuration document is not valid TOML for the expected shape.
	#[error("Configuration is malformed at `{path}`.")]
	Parse {
		/// Dotted path to the offending field.
		path: String,
		/// Underlying TOML failure.
		#[source]
		source: toml::de::Error,
	},

	/// Signing secret is shorter than the HMAC-SHA-512 minimum.
	#[error("The signing secret must be at least {min} bytes.")]
	SecretTooShort {
		/// Minimum accepted length in bytes.
		min: usize,
	},
	/// A numeric field must be strictly positive.
	#[error("The `{field}` value must be positive.")]
	NonPositive {
		/// Offending field name.
		field: &'static str,
	},
	/// The refresh window is shorter than the access window.
	#[error("The refresh token window must not be shorter than the access token window.")]
	RefreshShorterThanAccess,
	/// The authenticated tier grants fewer requests than the anonymous tier.
	#[error("The authenticated limit must be at least the default limit.")]
	AuthenticatedBelowDefault,
	/// An exemption path does not start with `/`.
	#[error("Exempt path `{path}` must start with '/'.")]
	InvalidExemptPath {
		/// Offending path.
		path: String,
	},
}
