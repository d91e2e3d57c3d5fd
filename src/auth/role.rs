//! Role set modeling used by session tokens and downstream role checks.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ROLE_DELIMITER, Role},
};

/// Ordered, deduplicated set of roles.
///
/// Roles keep the order in which they were first supplied so the signed claim is stable for a
/// given input. On the wire the set is a single comma-joined string (`"ROLE_USER,ROLE_ADMIN"`).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RoleSet {
	roles: Arc<[Role]>,
}
impl RoleSet {
	/// Creates a role set from any iterator, dropping duplicates after their first occurrence.
	pub fn new<I, S>(roles: I) -> Result<Self, IdentifierError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut ordered: Vec<Role> = Vec::new();

		for raw in roles {
			let role = Role::new(raw)?;

			if !ordered.contains(&role) {
				ordered.push(role);
			}
		}

		Ok(Self { roles: ordered.into() })
	}

	/// Parses the comma-joined claim form. An empty claim yields an empty set.
	pub fn from_claim(claim: &str) -> Result<Self, IdentifierError> {
		if claim.is_empty() {
			return Ok(Self::default());
		}

		Self::new(claim.split(ROLE_DELIMITER))
	}

	/// Renders the comma-joined claim form.
	pub fn to_claim(&self) -> String {
		let mut joined = String::new();

		for (idx, role) in self.roles.iter().enumerate() {
			if idx > 0 {
				joined.push(ROLE_DELIMITER);
			}

			joined.push_str(role);
		}

		joined
	}

	/// Number of distinct roles.
	pub fn len(&self) -> usize {
		self.roles.len()
	}

	/// Returns true if no roles are granted.
	pub fn is_empty(&self) -> bool {
		self.roles.is_empty()
	}

	/// Equality check against a single role name.
	pub fn contains(&self, role: &str) -> bool {
		self.roles.iter().any(|candidate| candidate.as_ref() == role)
	}

	/// Iterator over role names in claim order.
	pub fn iter(&self) -> RoleIter<'_> {
		RoleIter { inner: self.roles.iter() }
	}

	/// Returns the underlying slice of roles.
	pub fn as_slice(&self) -> &[Role] {
		&self.roles
	}
}
impl Debug for RoleSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("RoleSet").field(&self.to_claim()).finish()
	}
}
impl Display for RoleSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.to_claim())
	}
}
impl FromStr for RoleSet {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_claim(s)
	}
}
impl Serialize for RoleSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_claim())
	}
}
impl<'de> Deserialize<'de> for RoleSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let claim = String::deserialize(deserializer)?;

		Self::from_claim(&claim).map_err(DeError::custom)
	}
}

/// Iterator over role names.
pub struct RoleIter<'a> {
	inner: Iter<'a, Role>,
}
impl<'a> Iterator for RoleIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|role| role.as_ref())
	}
}
