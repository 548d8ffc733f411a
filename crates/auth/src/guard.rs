//! Request-boundary check for resource handlers.
//!
//! Claims are validated, the role is resolved from the identity store and the
//! engine is consulted. Any failure, including a deny, comes back as an error,
//! so a handler that propagates with `?` fails closed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use acs_core::{AggregateRoot, PrincipalId, RoleId};

use crate::{
    AccessClaims, Action, AuthzError, Decision, IdentityStore, Resource, Role,
    TokenValidationError, check, validate_claims,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No usable credentials were presented.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Token(#[from] TokenValidationError),

    #[error(transparent)]
    Authz(#[from] AuthzError),
}

/// Proof that a request passed the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
    pub role_name: String,
    pub resource: Resource,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct AccessGuard<S> {
    store: S,
}

impl<S: IdentityStore> AccessGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Check a request whose token may be absent; no claims is `Unauthorized`.
    pub fn require_claims(
        &self,
        claims: Option<&AccessClaims>,
        now: DateTime<Utc>,
        resource: &str,
        action: &str,
    ) -> Result<Grant, AccessError> {
        let Some(claims) = claims else {
            tracing::info!(resource, action, "request without access token");
            return Err(AccessError::Unauthorized("missing access token".into()));
        };
        self.require(claims, now, resource, action)
    }

    /// Check a token-bearing request.
    pub fn require(
        &self,
        claims: &AccessClaims,
        now: DateTime<Utc>,
        resource: &str,
        action: &str,
    ) -> Result<Grant, AccessError> {
        validate_claims(claims, now)?;
        let (resource, action) = parse(resource, action)?;
        let role = self.store.resolve_role(&claims.role_id)?;
        grant(claims.sub, &role, resource, action)
    }

    /// Check a request by principal id, resolving its current role.
    pub fn require_principal(
        &self,
        principal_id: &PrincipalId,
        resource: &str,
        action: &str,
    ) -> Result<Grant, AccessError> {
        let (resource, action) = parse(resource, action)?;
        let principal = self.store.resolve_principal(principal_id)?;
        let role = self.store.resolve_role(&principal.role_id)?;
        grant(principal.principal_id, &role, resource, action)
    }
}

fn parse(resource: &str, action: &str) -> Result<(Resource, Action), AuthzError> {
    Ok((resource.parse()?, action.parse()?))
}

fn grant(
    principal_id: PrincipalId,
    role: &Role,
    resource: Resource,
    action: Action,
) -> Result<Grant, AccessError> {
    match check(role, resource, action) {
        Decision::Allow => Ok(Grant {
            principal_id,
            role_id: *role.id(),
            role_name: role.name().to_string(),
            resource,
            action,
        }),
        Decision::Deny => {
            tracing::info!(%principal_id, role = role.name(), %resource, %action, "access denied");
            Err(AuthzError::PermissionDenied { resource, action }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{AccessRights, AuthConfig, InMemoryIdentityStore, Principal, RoleRepository};

    fn setup() -> (AccessGuard<Arc<InMemoryIdentityStore>>, Arc<InMemoryIdentityStore>, RoleId) {
        let store = Arc::new(InMemoryIdentityStore::new());
        let rights = AccessRights::empty().with(Resource::Openers, Action::View, true);
        let role = Role::new(RoleId::new(), "viewer", rights, Utc::now()).unwrap();
        let role_id = *store.insert_role(role).unwrap().id();
        (AccessGuard::new(Arc::clone(&store)), store, role_id)
    }

    fn fresh_claims(role_id: RoleId) -> AccessClaims {
        AuthConfig::default()
            .issue_claims(PrincipalId::new(), role_id, Utc::now())
            .unwrap()
    }

    #[test]
    fn allowed_request_yields_grant() {
        let (guard, _, role_id) = setup();
        let claims = fresh_claims(role_id);

        let grant = guard.require(&claims, Utc::now(), "openers", "view").unwrap();
        assert_eq!(grant.role_name, "viewer");
        assert_eq!(grant.principal_id, claims.sub);
    }

    #[test]
    fn denied_request_is_permission_denied() {
        let (guard, _, role_id) = setup();

        let err = guard
            .require(&fresh_claims(role_id), Utc::now(), "openers", "delete")
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::Authz(AuthzError::PermissionDenied {
                resource: Resource::Openers,
                action: Action::Delete,
            })
        );
    }

    #[test]
    fn unresolved_role_is_not_found() {
        let (guard, _, _) = setup();
        let missing = RoleId::new();

        let err = guard
            .require(&fresh_claims(missing), Utc::now(), "openers", "view")
            .unwrap_err();
        assert_eq!(err, AccessError::Authz(AuthzError::NotFound(missing)));
    }

    #[test]
    fn expired_token_is_rejected_before_lookup() {
        let (guard, _, _) = setup();
        let claims = fresh_claims(RoleId::new());

        let err = guard
            .require(&claims, claims.expires_at + Duration::seconds(1), "openers", "view")
            .unwrap_err();
        assert_eq!(err, AccessError::Token(TokenValidationError::Expired));
    }

    #[test]
    fn missing_claims_are_unauthorized() {
        let (guard, _, role_id) = setup();

        let err = guard.require_claims(None, Utc::now(), "openers", "view").unwrap_err();
        assert!(matches!(err, AccessError::Unauthorized(_)));

        let claims = fresh_claims(role_id);
        assert!(guard.require_claims(Some(&claims), Utc::now(), "openers", "view").is_ok());
    }

    #[test]
    fn configured_ttl_bounds_the_token() {
        let (guard, _, role_id) = setup();
        let config = AuthConfig {
            access_token_ttl: Duration::minutes(1),
            ..AuthConfig::default()
        };
        let claims = config.issue_claims(PrincipalId::new(), role_id, Utc::now()).unwrap();

        let later = claims.issued_at + Duration::minutes(2);
        assert_eq!(
            guard.require(&claims, later, "openers", "view").unwrap_err(),
            AccessError::Token(TokenValidationError::Expired)
        );
    }

    #[test]
    fn invalid_names_fail_before_lookup() {
        let (guard, _, _) = setup();

        let err = guard
            .require(&fresh_claims(RoleId::new()), Utc::now(), "gates", "view")
            .unwrap_err();
        assert!(matches!(err, AccessError::Authz(AuthzError::InvalidRequest(_))));
    }

    #[test]
    fn principal_lookup_follows_current_role() {
        let (guard, store, role_id) = setup();
        let principal_id = PrincipalId::new();
        store
            .insert_principal(Principal::new(principal_id, "vasya", role_id))
            .unwrap();

        assert!(guard.require_principal(&principal_id, "openers", "view").is_ok());

        let stranger = PrincipalId::new();
        assert_eq!(
            guard.require_principal(&stranger, "openers", "view").unwrap_err(),
            AccessError::Authz(AuthzError::UnknownPrincipal(stranger))
        );
    }
}
