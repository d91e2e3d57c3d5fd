//! Client identity keys used to partition rate-limit buckets.
//!
//! A key is `"<ip>_<uaHash>"`: the remote address plus a short fingerprint of the raw
//! User-Agent bytes (`unknown` when absent). It groups requests from one network origin and client
//! program. It is trivially spoofable and carries no authorization weight.

// std
use std::{borrow::Borrow, net::IpAddr};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const UNKNOWN: &str = "unknown";
const FINGERPRINT_BYTES: usize = 12;

/// Derived per-caller key; attached to each request once and reused downstream.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);
impl ClientKey {
	/// Builds the key from an already-rendered remote address and the raw User-Agent bytes.
	///
	/// The header is hashed as sent, so agents with non-UTF-8 bytes still get their own key.
	pub fn new(remote_address: &str, user_agent: Option<&[u8]>) -> Self {
		let fingerprint = user_agent.map(fingerprint).unwrap_or_else(|| UNKNOWN.to_owned());

		Self(format!("{remote_address}_{fingerprint}"))
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for ClientKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ClientKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for ClientKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientKey({})", self.0)
	}
}
impl Display for ClientKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Resolves [`ClientKey`]s from connection and header metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIdentityResolver {
	trust_forwarded_for: bool,
}
impl ClientIdentityResolver {
	/// Creates a resolver; `trust_forwarded_for` enables `X-Forwarded-For` for deployments
	/// behind a trusted proxy.
	pub fn new(trust_forwarded_for: bool) -> Self {
		Self { trust_forwarded_for }
	}

	/// Resolves the key for one request.
	///
	/// `forwarded_for` is the raw `X-Forwarded-For` value and is ignored unless trusted; its
	/// first entry wins when it parses as an IP address.
	pub fn resolve(
		&self,
		remote: Option<IpAddr>,
		forwarded_for: Option<&str>,
		user_agent: Option<&[u8]>,
	) -> ClientKey {
		let forwarded = forwarded_for
			.filter(|_| self.trust_forwarded_for)
			.and_then(|value| value.split(',').next())
			.and_then(|first| first.trim().parse::<IpAddr>().ok());
		let address = match forwarded.or(remote) {
			Some(ip) => ip.to_string(),
			None => UNKNOWN.to_owned(),
		};

		ClientKey::new(&address, user_agent)
	}
}

fn fingerprint(user_agent: &[u8]) -> String {
	let digest = Sha256::digest(user_agent);

	STANDARD_NO_PAD.encode(&digest[..FINGERPRINT_BYTES])
}
