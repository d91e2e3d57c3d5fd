//! Gate configuration loaded from TOML.
//!
//! ```toml
//! secret = "at-least-32-bytes-of-signing-material"
//! access_token_ttl_secs = 3600
//! refresh_token_ttl_secs = 604800
//! default_limit = 20
//! authenticated_limit = 100
//! window_minutes = 1
//! exempt_paths = ["/health", "/metrics"]
//! revocation_failure = "fail_open"
//! trust_forwarded_for = false
//! ```
//!
//! Only `secret` is required.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{MIN_SIGNING_SECRET_LEN, SigningSecret},
	error::ConfigError,
	gate::RevocationFailurePolicy,
	limit::RateLimitPolicy,
};

/// Settings for the token codec, rate limiter, and gate policies.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
	/// HMAC-SHA-512 signing secret.
	pub secret: SigningSecret,
	/// Access token window in seconds.
	#[serde(default = "GateConfig::default_access_ttl_secs")]
	pub access_token_ttl_secs: u32,
	/// Refresh token window in seconds.
	#[serde(default = "GateConfig::default_refresh_ttl_secs")]
	pub refresh_token_ttl_secs: u32,
	/// Requests per window for anonymous callers.
	#[serde(default = "GateConfig::default_limit")]
	pub default_limit: u32,
	/// Requests per window for authenticated callers.
	#[serde(default = "GateConfig::default_authenticated_limit")]
	pub authenticated_limit: u32,
	/// Refill window in minutes.
	#[serde(default = "GateConfig::default_window_minutes")]
	pub window_minutes: u32,
	/// Paths exempt from rate limiting.
	#[serde(default = "GateConfig::default_exempt_paths")]
	pub exempt_paths: Vec<String>,
	/// Behaviour when the revocation store cannot be consulted.
	#[serde(default)]
	pub revocation_failure: RevocationFailurePolicy,
	/// Use the first `X-Forwarded-For` entry as the client address.
	#[serde(default)]
	pub trust_forwarded_for: bool,
}
impl GateConfig {
	/// Creates a configuration with default windows and limits.
	pub fn new(secret: SigningSecret) -> Self {
		Self {
			secret,
			access_token_ttl_secs: Self::default_access_ttl_secs(),
			refresh_token_ttl_secs: Self::default_refresh_ttl_secs(),
			default_limit: Self::default_limit(),
			authenticated_limit: Self::default_authenticated_limit(),
			window_minutes: Self::default_window_minutes(),
			exempt_paths: Self::default_exempt_paths(),
			revocation_failure: RevocationFailurePolicy::default(),
			trust_forwarded_for: false,
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let document: toml::Table = toml::from_str(raw)
			.map_err(|source| ConfigError::Parse { path: ".".into(), source })?;
		let config: Self = serde_path_to_error::deserialize(toml::Value::Table(document))
			.map_err(|e| ConfigError::Parse { path: e.path().to_string(), source: e.into_inner() })?;

		config.validate()?;

		Ok(config)
	}

	/// Reads, parses, and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		Self::from_toml_str(&fs::read_to_string(path)?)
	}

	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.secret.len() < MIN_SIGNING_SECRET_LEN {
			return Err(ConfigError::SecretTooShort { min: MIN_SIGNING_SECRET_LEN });
		}

		for (field, value) in [
			("access_token_ttl_secs", self.access_token_ttl_secs),
			("refresh_token_ttl_secs", self.refresh_token_ttl_secs),
			("default_limit", self.default_limit),
			("authenticated_limit", self.authenticated_limit),
			("window_minutes", self.window_minutes),
		] {
			if value == 0 {
				return Err(ConfigError::NonPositive { field });
			}
		}

		if self.refresh_token_ttl_secs < self.access_token_ttl_secs {
			return Err(ConfigError::RefreshShorterThanAccess);
		}
		if self.authenticated_limit < self.default_limit {
			return Err(ConfigError::AuthenticatedBelowDefault);
		}
		if let Some(path) = self.exempt_paths.iter().find(|path| !path.starts_with('/')) {
			return Err(ConfigError::InvalidExemptPath { path: path.clone() });
		}

		Ok(())
	}

	/// Access token window.
	pub fn access_token_ttl(&self) -> Duration {
		Duration::seconds(i64::from(self.access_token_ttl_secs))
	}

	/// Refresh token window.
	pub fn refresh_token_ttl(&self) -> Duration {
		Duration::seconds(i64::from(self.refresh_token_ttl_secs))
	}

	/// Bucket refill window.
	pub fn window(&self) -> Duration {
		Duration::minutes(i64::from(self.window_minutes))
	}

	/// Rate-limit policy derived from the configured limits and exemptions.
	pub fn rate_limit_policy(&self) -> RateLimitPolicy {
		RateLimitPolicy::new(self.default_limit, self.authenticated_limit, self.window())
			.with_exempt_paths(self.exempt_paths.iter().cloned())
	}

	fn default_access_ttl_secs() -> u32 {
		3_600
	}

	fn default_refresh_ttl_secs() -> u32 {
		604_800
	}

	fn default_limit() -> u32 {
		20
	}

	fn default_authenticated_limit() -> u32 {
		100
	}

	fn default_window_minutes() -> u32 {
		1
	}

	fn default_exempt_paths() -> Vec<String> {
		vec!["/health".into(), "/metrics".into()]
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SECRET: &str = "config-test-secret-0123456789abcdefghij";

	#[test]
	fn minimal_document_uses_defaults() {
		let config = GateConfig::from_toml_str(&format!("secret = \"{SECRET}\""))
			.expect("Minimal configuration should load.");

		assert_eq!(config.access_token_ttl(), Duration::hours(1));
		assert_eq!(config.refresh_token_ttl(), Duration::days(7));
		assert_eq!(config.window(), Duration::minutes(1));
		assert_eq!(config.revocation_failure, RevocationFailurePolicy::FailOpen);
		assert_eq!(config.rate_limit_policy(), RateLimitPolicy::default());
	}

	#[test]
	fn full_document_overrides_defaults() {
		let raw = format!(
			r#"
secret = "{SECRET}"
access_token_ttl_secs = 900
refresh_token_ttl_secs = 86400
default_limit = 5
authenticated_limit = 50
window_minutes = 10
exempt_paths = ["/actuator/health"]
revocation_failure = "fail_closed"
trust_forwarded_for = true
"#
		);
		let config = GateConfig::from_toml_str(&raw).expect("Full configuration should load.");
		let policy = config.rate_limit_policy();

		assert_eq!(config.access_token_ttl(), Duration::minutes(15));
		assert_eq!(policy.default_limit, 5);
		assert_eq!(policy.authenticated_limit, 50);
		assert_eq!(policy.window, Duration::minutes(10));
		assert_eq!(policy.exempt_paths, vec!["/actuator/health".to_owned()]);
		assert_eq!(config.revocation_failure, RevocationFailurePolicy::FailClosed);
		assert!(config.trust_forwarded_for);
	}

	#[test]
	fn validation_names_the_problem() {
		assert!(matches!(
			GateConfig::from_toml_str("secret = \"short\""),
			Err(ConfigError::SecretTooShort { min: MIN_SIGNING_SECRET_LEN })
		));
		assert!(matches!(
			GateConfig::from_toml_str(&format!("secret = \"{SECRET}\"\ndefault_limit = 0")),
			Err(ConfigError::NonPositive { field: "default_limit" })
		));
		assert!(matches!(
			GateConfig::from_toml_str(&format!(
				"secret = \"{SECRET}\"\ndefault_limit = 30\nauthenticated_limit = 10"
			)),
			Err(ConfigError::AuthenticatedBelowDefault)
		));
		assert!(matches!(
			GateConfig::from_toml_str(&format!(
				"secret = \"{SECRET}\"\naccess_token_ttl_secs = 100\nrefresh_token_ttl_secs = 10"
			)),
			Err(ConfigError::RefreshShorterThanAccess)
		));
		assert!(matches!(
			GateConfig::from_toml_str(&format!("secret = \"{SECRET}\"\nexempt_paths = [\"health\"]")),
			Err(ConfigError::InvalidExemptPath { .. })
		));
	}

	#[test]
	fn malformed_fields_report_their_path() {
		let error = GateConfig::from_toml_str(&format!("secret = \"{SECRET}\"\ndefault_limit = \"many\""))
			.expect_err("A string limit should be rejected.");

		assert!(matches!(error, ConfigError::Parse { ref path, .. } if path == "default_limit"));
		assert!(GateConfig::from_toml_str("secret = ").is_err());
		assert!(GateConfig::from_toml_str(&format!("secret = \"{SECRET}\"\nunknown = 1")).is_err());
	}
}
