//! Auth-domain identifiers, role sets, principals, and session token models.

pub mod id;
pub mod principal;
pub mod role;
pub mod token;

pub use id::*;
pub use principal::*;
pub use role::*;
pub use token::{claims::*, codec::*, record::*, secret::*};
