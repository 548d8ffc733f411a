//! `acs-auth` — role-based authorization for the openers access-control system.
//!
//! Decides whether a principal's role may perform an action on a resource
//! collection. Storage and transport stay outside this crate; the in-memory
//! identity store exists for bootstrap, tests and single-process deployments.

pub mod admin;
pub mod authorize;
pub mod claims;
pub mod clients;
pub mod config;
pub mod error;
pub mod guard;
pub mod permissions;
pub mod principal;
pub mod resource;
pub mod rights;
pub mod roles;
pub mod seed;
pub mod store;

pub use admin::RoleAdministration;
pub use authorize::{
    AuthorizationExplanation, Decision, DenialReason, RbacRegistry, authorize, check,
    explain_authorization,
};
pub use claims::{
    ACCESS_TOKEN_TTL_MINUTES, AccessClaims, MAX_ACCESS_TOKEN_TTL_MINUTES, TokenValidationError,
    validate_claims,
};
pub use clients::{
    ClientStore, InMemoryClientStore, REFRESH_TOKEN_TTL_MINUTES, ROTATED_REFRESH_TOKEN_TTL_MINUTES,
    RefreshClient, Session, TokenIssuer,
};
pub use config::AuthConfig;
pub use error::AuthzError;
pub use guard::{AccessError, AccessGuard, Grant};
pub use permissions::Permission;
pub use principal::Principal;
pub use resource::{Action, Resource};
pub use rights::{AccessRights, ActionRights};
pub use roles::{Role, RoleRecord};
pub use seed::{PolicyDocument, SeededIdentities, bootstrap};
pub use store::{IdentityStore, InMemoryIdentityStore, RoleRepository};
