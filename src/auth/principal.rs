//! Verified callers and the per-request security context handed to downstream handlers.

// self
use crate::{
	_prelude::*,
	auth::{RoleSet, Subject},
};

/// Identity established from a verified, non-revoked session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Caller identifier from the `sub` claim.
	pub subject: Subject,
	/// Roles from the comma-joined `roles` claim.
	pub roles: RoleSet,
}
impl Principal {
	/// Creates a principal for the provided subject and roles.
	pub fn new(subject: Subject, roles: RoleSet) -> Self {
		Self { subject, roles }
	}

	/// Simple equality role check used by downstream authorization.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.contains(role)
	}
}

/// Explicit per-request security context.
///
/// The gate writes one into the request extensions; handlers read it back instead of consulting
/// any ambient state. An absent principal means the caller is anonymous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityContext {
	principal: Option<Principal>,
}
impl SecurityContext {
	/// Context for a caller without a usable credential.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Context for a verified caller.
	pub fn authenticated(principal: Principal) -> Self {
		Self { principal: Some(principal) }
	}

	/// Returns `true` if a real principal has been established.
	pub fn is_authenticated(&self) -> bool {
		self.principal.is_some()
	}

	/// The established principal, if any.
	pub fn principal(&self) -> Option<&Principal> {
		self.principal.as_ref()
	}

	/// Name of the established principal, if any.
	pub fn name(&self) -> Option<&str> {
		self.principal.as_ref().map(|principal| principal.subject.as_ref())
	}
}
