use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Action, AuthzError, Permission, Resource, Role};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(value: bool) -> Self {
        if value { Decision::Allow } else { Decision::Deny }
    }
}

/// Decide whether `role` may perform `action` on `resource`.
///
/// - No IO
/// - No panics
/// - Names outside the closed enumerations are `InvalidRequest`, never a deny
pub fn authorize(role: &Role, resource: &str, action: &str) -> Result<Decision, AuthzError> {
    let resource: Resource = resource.parse()?;
    let action: Action = action.parse()?;
    Ok(check(role, resource, action))
}

/// Typed form of [`authorize`] for callers holding parsed names.
pub fn check(role: &Role, resource: Resource, action: Action) -> Decision {
    let decision = Decision::from(role.access_rights().allows(resource, action));
    tracing::debug!(
        role = role.name(),
        %resource,
        %action,
        ?decision,
        "authorization decision"
    );
    decision
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was allowed or denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub permission: Permission,
    pub decision: Decision,
    pub reason: String,
    pub role: String,
    /// Actions the role holds on the requested resource.
    pub granted_on_resource: Vec<Action>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialReason {
    pub message: String,
    /// Everything the role is allowed to do, as `resource.action`.
    pub effective_permissions: Vec<Permission>,
    pub suggestions: Vec<String>,
}

/// Explain the decision [`authorize`] would make for the same inputs.
pub fn explain_authorization(
    role: &Role,
    resource: &str,
    action: &str,
) -> Result<AuthorizationExplanation, AuthzError> {
    let resource: Resource = resource.parse()?;
    let action: Action = action.parse()?;
    let permission = Permission::new(resource, action);
    let decision = check(role, resource, action);
    let granted_on_resource = role.access_rights().rights(resource).granted();

    if decision.is_allowed() {
        return Ok(AuthorizationExplanation {
            permission,
            decision,
            reason: format!("role '{}' grants '{permission}'", role.name()),
            role: role.name().to_string(),
            granted_on_resource,
            denial_reason: None,
        });
    }

    let effective_permissions: Vec<Permission> = role
        .access_rights()
        .granted()
        .into_iter()
        .map(|(r, a)| Permission::new(r, a))
        .collect();

    let mut suggestions = vec![
        format!("Assign a role that grants '{permission}'"),
        format!(
            "Have a principal with 'roles.edit' grant '{permission}' to role '{}'",
            role.name()
        ),
    ];
    if granted_on_resource.is_empty() {
        suggestions.push(format!(
            "Role '{}' has no access to {} at all; check that the intended role was assigned",
            role.name(),
            resource.label()
        ));
    }

    Ok(AuthorizationExplanation {
        permission,
        decision,
        reason: format!("role '{}' does not grant '{permission}'", role.name()),
        role: role.name().to_string(),
        granted_on_resource,
        denial_reason: Some(DenialReason {
            message: format!("Missing required permission: '{permission}'"),
            effective_permissions,
            suggestions,
        }),
    })
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub permissions: Vec<Permission>,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub description: String,
    pub category: Resource,
}

/// Complete view of the RBAC policy for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: BTreeMap<String, RoleDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let roles = roles
            .into_iter()
            .map(|role| {
                let permissions = role
                    .access_rights()
                    .granted()
                    .into_iter()
                    .map(|(r, a)| Permission::new(r, a))
                    .collect();
                (
                    role.name().to_string(),
                    RoleDefinition {
                        name: role.name().to_string(),
                        permissions,
                    },
                )
            })
            .collect();

        let permissions = Permission::all()
            .map(|p| {
                (
                    p.to_string(),
                    PermissionDefinition {
                        name: p.to_string(),
                        description: p.description(),
                        category: p.resource,
                    },
                )
            })
            .collect();

        Self { roles, permissions }
    }

    /// Roles granting `permission`, by name.
    pub fn roles_granting(&self, permission: Permission) -> Vec<&str> {
        self.roles
            .values()
            .filter(|def| def.permissions.contains(&permission))
            .map(|def| def.name.as_str())
            .collect()
    }
}
