use thiserror::Error;

use acs_core::{DomainError, PrincipalId, RoleId};

use crate::{Action, Resource};

/// Failures surfaced by the authorization engine and the identity store.
///
/// None of these is ever interpreted as an allow; callers at the handler
/// boundary turn every variant into a rejected request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Resource or action outside the closed enumerations (caller bug).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A role reference did not resolve.
    #[error("role not found: {0}")]
    NotFound(RoleId),

    #[error("no role named '{0}'")]
    UnknownRoleName(String),

    /// A principal reference did not resolve.
    #[error("principal not found: {0}")]
    UnknownPrincipal(PrincipalId),

    /// An access-rights matrix is incomplete or ill-typed.
    #[error("malformed policy: {0}")]
    MalformedPolicy(String),

    /// The acting role lacks the permission for an operation.
    #[error("permission denied: {resource}.{action}")]
    PermissionDenied { resource: Resource, action: Action },

    /// Stale version or duplicate unique key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The role is still referenced by at least one principal.
    #[error("role {0} is still assigned to principals")]
    RoleInUse(RoleId),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl AuthzError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPolicy(msg.into())
    }
}

impl From<DomainError> for AuthzError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::InvalidRequest(msg),
        }
    }
}
