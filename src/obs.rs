//! Observability helpers for the request gate.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `admission_gate.request` with `stage` and `client`
//!   fields, plus events for rejected, revoked, and unverifiable tokens.
//! - `metrics` increments the `admission_gate_decision_total` counter for every gate decision,
//!   labeled by `outcome`.

mod events;
mod metrics;
mod tracing;

pub use events::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Terminal outcome of one pass through the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateOutcome {
	/// A verified, non-revoked principal was established.
	Authenticated,
	/// The request proceeds without a principal.
	Anonymous,
	/// The client's bucket was empty.
	Throttled,
	/// A revoked token was presented.
	Revoked,
	/// The revocation store could not be consulted and the policy refused the request.
	Unavailable,
}
impl GateOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GateOutcome::Authenticated => "authenticated",
			GateOutcome::Anonymous => "anonymous",
			GateOutcome::Throttled => "throttled",
			GateOutcome::Revoked => "revoked",
			GateOutcome::Unavailable => "unavailable",
		}
	}
}
impl Display for GateOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
