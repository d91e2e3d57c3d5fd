//! Signed session tokens: claims, the HMAC codec, redacted secrets, and revocation records.

pub mod claims;
pub mod codec;
pub mod record;
pub mod secret;
