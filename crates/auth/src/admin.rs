//! Administrative role operations, gated by the acting role's own matrix.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use acs_core::{AggregateRoot, ExpectedVersion, RoleId};

use crate::{AccessRights, Action, AuthzError, Decision, Resource, Role, RoleRepository, check};

/// Role CRUD on top of a [`RoleRepository`].
///
/// Every mutation first checks the actor against `roles.<action>`; a denied
/// actor gets `PermissionDenied` and the store is not touched.
#[derive(Debug, Clone)]
pub struct RoleAdministration<S> {
    store: S,
}

impl<S: RoleRepository> RoleAdministration<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_role(
        &self,
        actor: &Role,
        name: &str,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Arc<Role>, AuthzError> {
        require(actor, Action::Create)?;
        let role = self
            .store
            .insert_role(Role::new(RoleId::new(), name, access_rights, now)?)?;
        tracing::info!(actor = actor.name(), role = role.name(), role_id = %role.id(), "role created");
        Ok(role)
    }

    /// Replace the matrix of `role_id`.
    ///
    /// `expected` is the version the caller read; a concurrent edit in between
    /// makes this fail with `Conflict`.
    pub fn edit_role(
        &self,
        actor: &Role,
        role_id: &RoleId,
        expected: ExpectedVersion,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Arc<Role>, AuthzError> {
        require(actor, Action::Edit)?;
        let role = self.store.update_role(role_id, expected, access_rights, now)?;
        tracing::info!(
            actor = actor.name(),
            role = role.name(),
            version = role.version(),
            "role access rights updated"
        );
        Ok(role)
    }

    pub fn delete_role(&self, actor: &Role, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        require(actor, Action::Delete)?;
        let role = self.store.remove_role(role_id)?;
        tracing::info!(actor = actor.name(), role = role.name(), "role deleted");
        Ok(role)
    }

    pub fn view_role(&self, actor: &Role, role_id: &RoleId) -> Result<Arc<Role>, AuthzError> {
        require(actor, Action::View)?;
        self.store.resolve_role(role_id)
    }

    pub fn list_roles(&self, actor: &Role) -> Result<Vec<Arc<Role>>, AuthzError> {
        require(actor, Action::List)?;
        self.store.list_roles()
    }
}

fn require(actor: &Role, action: Action) -> Result<(), AuthzError> {
    match check(actor, Resource::Roles, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(actor = actor.name(), %action, "role administration denied");
            Err(AuthzError::PermissionDenied {
                resource: Resource::Roles,
                action,
            })
        }
    }
}
