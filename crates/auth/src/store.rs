//! Identity store contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use acs_core::{AggregateRoot, ExpectedVersion, PrincipalId, RoleId};

use crate::{AccessRights, AuthzError, Principal, Role};

/// Read side consumed by the engine's callers.
///
/// Implementations hand out immutable snapshots; a returned `Arc<Role>` is
/// never changed afterwards, even if the role is edited concurrently.
pub trait IdentityStore: Send + Sync {
    /// Resolve a role reference. Absence is `NotFound`, never a default role.
    fn resolve_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError>;

    fn resolve_principal(&self, principal_id: &PrincipalId) -> Result<Principal, AuthzError>;
}

/// Write side used by bootstrap and role administration.
pub trait RoleRepository: IdentityStore {
    /// Insert a new role. Names are unique.
    fn insert_role(&self, role: Role) -> Result<Arc<Role>, AuthzError>;

    /// Replace a role's matrix as one snapshot, guarded by `expected`.
    fn update_role(
        &self,
        role_id: &RoleId,
        expected: ExpectedVersion,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Arc<Role>, AuthzError>;

    /// Remove a role no principal references.
    fn remove_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError>;

    fn find_role_by_name(&self, name: &str) -> Result<Arc<Role>, AuthzError>;

    fn list_roles(&self) -> Result<Vec<Arc<Role>>, AuthzError>;

    /// Register a principal. Its role must exist and its login must be unique.
    fn insert_principal(&self, principal: Principal) -> Result<(), AuthzError>;
}

impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    fn resolve_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        (**self).resolve_role(role_id)
    }

    fn resolve_principal(&self, principal_id: &PrincipalId) -> Result<Principal, AuthzError> {
        (**self).resolve_principal(principal_id)
    }
}

impl<S> RoleRepository for Arc<S>
where
    S: RoleRepository + ?Sized,
{
    fn insert_role(&self, role: Role) -> Result<Arc<Role>, AuthzError> {
        (**self).insert_role(role)
    }

    fn update_role(
        &self,
        role_id: &RoleId,
        expected: ExpectedVersion,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Arc<Role>, AuthzError> {
        (**self).update_role(role_id, expected, access_rights, now)
    }

    fn remove_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        (**self).remove_role(role_id)
    }

    fn find_role_by_name(&self, name: &str) -> Result<Arc<Role>, AuthzError> {
        (**self).find_role_by_name(name)
    }

    fn list_roles(&self) -> Result<Vec<Arc<Role>>, AuthzError> {
        (**self).list_roles()
    }

    fn insert_principal(&self, principal: Principal) -> Result<(), AuthzError> {
        (**self).insert_principal(principal)
    }
}

#[derive(Debug, Default)]
struct Directory {
    roles: HashMap<RoleId, Arc<Role>>,
    principals: HashMap<PrincipalId, Principal>,
}

impl Directory {
    fn is_referenced(&self, role_id: &RoleId) -> bool {
        self.principals.values().any(|p| &p.role_id == role_id)
    }
}

/// In-memory identity store for tests/dev and single-process deployments.
///
/// Roles and principals share one lock so referential checks (delete while
/// referenced, principal pointing at a missing role) are atomic.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<Directory>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Directory>, AuthzError> {
        self.inner
            .read()
            .map_err(|_| AuthzError::Storage("identity store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Directory>, AuthzError> {
        self.inner
            .write()
            .map_err(|_| AuthzError::Storage("identity store lock poisoned".into()))
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn resolve_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        self.read()?
            .roles
            .get(role_id)
            .cloned()
            .ok_or(AuthzError::NotFound(*role_id))
    }

    fn resolve_principal(&self, principal_id: &PrincipalId) -> Result<Principal, AuthzError> {
        self.read()?
            .principals
            .get(principal_id)
            .cloned()
            .ok_or(AuthzError::UnknownPrincipal(*principal_id))
    }
}

impl RoleRepository for InMemoryIdentityStore {
    fn insert_role(&self, role: Role) -> Result<Arc<Role>, AuthzError> {
        let mut dir = self.write()?;
        if dir.roles.contains_key(role.id()) {
            return Err(AuthzError::Conflict(format!("role {} already exists", role.id())));
        }
        if dir.roles.values().any(|r| r.name() == role.name()) {
            return Err(AuthzError::Conflict(format!(
                "role name '{}' already exists",
                role.name()
            )));
        }

        let role = Arc::new(role);
        dir.roles.insert(*role.id(), Arc::clone(&role));
        Ok(role)
    }

    fn update_role(
        &self,
        role_id: &RoleId,
        expected: ExpectedVersion,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Arc<Role>, AuthzError> {
        let mut dir = self.write()?;
        let current = dir.roles.get(role_id).ok_or(AuthzError::NotFound(*role_id))?;
        expected.check(current.version())?;

        let next = Arc::new(current.revise(access_rights, now));
        dir.roles.insert(*role_id, Arc::clone(&next));
        Ok(next)
    }

    fn remove_role(&self, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        let mut dir = self.write()?;
        if !dir.roles.contains_key(role_id) {
            return Err(AuthzError::NotFound(*role_id));
        }
        if dir.is_referenced(role_id) {
            return Err(AuthzError::RoleInUse(*role_id));
        }
        dir.roles.remove(role_id).ok_or(AuthzError::NotFound(*role_id))
    }

    fn find_role_by_name(&self, name: &str) -> Result<Arc<Role>, AuthzError> {
        self.read()?
            .roles
            .values()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| AuthzError::UnknownRoleName(name.to_string()))
    }

    fn list_roles(&self) -> Result<Vec<Arc<Role>>, AuthzError> {
        let mut roles: Vec<_> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(roles)
    }

    fn insert_principal(&self, principal: Principal) -> Result<(), AuthzError> {
        let mut dir = self.write()?;
        if !dir.roles.contains_key(&principal.role_id) {
            return Err(AuthzError::NotFound(principal.role_id));
        }
        if dir.principals.values().any(|p| p.login == principal.login) {
            return Err(AuthzError::Conflict(format!(
                "login '{}' already exists",
                principal.login
            )));
        }
        dir.principals.insert(principal.principal_id, principal);
        Ok(())
    }
}
