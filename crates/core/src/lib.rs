//! `acs-core` — domain primitives shared by the access-control crates.
//!
//! Identifiers, the domain error model and optimistic versioning. No IO.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{PrincipalId, RoleId};
