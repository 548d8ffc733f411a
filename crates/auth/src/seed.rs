//! Bootstrap policy: roles and principals installed when a store is empty.
//!
//! The canonical policy ships as data (`seed/roles.json`) and is parsed through
//! the same strict path as any stored role, so adding a role is an edit to a
//! document, not to code.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use acs_core::{AggregateRoot, PrincipalId, RoleId};

use crate::{AuthzError, Principal, Role, RoleRecord, RoleRepository};

const EMBEDDED_POLICY: &str = include_str!("../seed/roles.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedRole {
    pub name: String,
    pub access_rights: Value,
}

/// A principal bound to a role by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPrincipal {
    pub login: String,
    pub role: String,
}

/// Declarative policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub roles: Vec<SeedRole>,
    #[serde(default)]
    pub principals: Vec<SeedPrincipal>,
}

impl PolicyDocument {
    /// The built-in `admin` / `manufacturer` / `normal` policy.
    pub fn embedded() -> Result<Self, AuthzError> {
        Self::from_json(EMBEDDED_POLICY)
    }

    pub fn from_json(json: &str) -> Result<Self, AuthzError> {
        serde_json::from_str(json)
            .map_err(|e| AuthzError::malformed(format!("policy document: {e}")))
    }

    /// Validate every role in the document, stamping them with `now`.
    ///
    /// Nothing is returned unless the whole document is valid.
    pub fn build_roles(&self, now: DateTime<Utc>) -> Result<Vec<Role>, AuthzError> {
        let mut seen = HashSet::new();
        self.roles
            .iter()
            .map(|seed| {
                if !seen.insert(seed.name.as_str()) {
                    return Err(AuthzError::malformed(format!(
                        "role '{}' is defined more than once",
                        seed.name
                    )));
                }
                let record = RoleRecord {
                    name: seed.name.clone(),
                    access_rights: seed.access_rights.clone(),
                    created_at: now,
                    updated_at: Some(now),
                };
                Role::load(RoleId::new(), record)
            })
            .collect()
    }
}

/// Ids assigned during [`bootstrap`], keyed by role name and login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeededIdentities {
    pub roles: BTreeMap<String, RoleId>,
    pub principals: BTreeMap<String, PrincipalId>,
}

impl SeededIdentities {
    pub fn role_id(&self, name: &str) -> Option<RoleId> {
        self.roles.get(name).copied()
    }

    pub fn principal_id(&self, login: &str) -> Option<PrincipalId> {
        self.principals.get(login).copied()
    }
}

/// Install `doc` into `store`.
///
/// The document is fully validated (matrices, unique logins and
/// principal→role references) before the first write.
pub fn bootstrap<S: RoleRepository>(
    store: &S,
    doc: &PolicyDocument,
    now: DateTime<Utc>,
) -> Result<SeededIdentities, AuthzError> {
    let roles = doc.build_roles(now)?;

    let known: HashSet<&str> = roles.iter().map(|r| r.name()).collect();
    if let Some(orphan) = doc.principals.iter().find(|p| !known.contains(p.role.as_str())) {
        return Err(AuthzError::malformed(format!(
            "principal '{}' references undefined role '{}'",
            orphan.login, orphan.role
        )));
    }

    let mut logins = HashSet::new();
    if let Some(dup) = doc.principals.iter().find(|p| !logins.insert(p.login.as_str())) {
        return Err(AuthzError::malformed(format!(
            "login '{}' is defined more than once",
            dup.login
        )));
    }

    let mut seeded = SeededIdentities::default();
    for role in roles {
        let role = store.insert_role(role)?;
        seeded.roles.insert(role.name().to_string(), *role.id());
    }

    for seed in &doc.principals {
        let role_id = seeded
            .role_id(&seed.role)
            .ok_or_else(|| AuthzError::UnknownRoleName(seed.role.clone()))?;
        let principal = Principal::new(PrincipalId::new(), seed.login.clone(), role_id);
        seeded
            .principals
            .insert(seed.login.clone(), principal.principal_id);
        store.insert_principal(principal)?;
    }

    tracing::info!(
        roles = seeded.roles.len(),
        principals = seeded.principals.len(),
        "access policy bootstrapped"
    );
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{IdentityStore, InMemoryIdentityStore};

    #[test]
    fn embedded_policy_parses() {
        let doc = PolicyDocument::embedded().unwrap();
        let names: Vec<_> = doc.roles.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["admin", "manufacturer", "normal"]);
        assert_eq!(doc.principals.len(), 3);
        assert_eq!(doc.build_roles(Utc::now()).unwrap().len(), 3);
    }

    #[test]
    fn bootstrap_binds_principals_to_roles() {
        let store = InMemoryIdentityStore::new();
        let seeded = bootstrap(&store, &PolicyDocument::embedded().unwrap(), Utc::now()).unwrap();

        let vasya = store
            .resolve_principal(&seeded.principal_id("vasya").unwrap())
            .unwrap();
        assert_eq!(Some(vasya.role_id), seeded.role_id("normal"));
        assert_eq!(store.find_role_by_name("normal").unwrap().id(), &vasya.role_id);
    }

    #[test]
    fn partial_matrix_aborts_before_any_write() {
        let mut doc = PolicyDocument::embedded().unwrap();
        doc.roles[2].access_rights["barrierModels"]
            .as_object_mut()
            .unwrap()
            .remove("delete");
        let store = InMemoryIdentityStore::new();

        let err = bootstrap(&store, &doc, Utc::now()).unwrap_err();

        assert_eq!(
            err,
            AuthzError::MalformedPolicy("role 'normal': barrierModels.delete: missing action".into())
        );
        assert!(store.list_roles().unwrap().is_empty());
    }

    #[test]
    fn duplicate_role_names_are_malformed() {
        let mut doc = PolicyDocument::embedded().unwrap();
        let copy = doc.roles[0].clone();
        doc.roles.push(copy);

        assert!(matches!(
            doc.build_roles(Utc::now()),
            Err(AuthzError::MalformedPolicy(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn principal_with_unknown_role_is_malformed() {
        let mut doc = PolicyDocument::embedded().unwrap();
        doc.principals.push(SeedPrincipal {
            login: "intruder".into(),
            role: "superuser".into(),
        });
        let store = InMemoryIdentityStore::new();

        assert!(matches!(
            bootstrap(&store, &doc, Utc::now()),
            Err(AuthzError::MalformedPolicy(msg)) if msg.contains("superuser")
        ));
        assert!(store.list_roles().unwrap().is_empty());
    }

    #[test]
    fn duplicate_login_aborts_before_any_write() {
        let mut doc = PolicyDocument::embedded().unwrap();
        doc.principals.push(SeedPrincipal {
            login: "localadmin".into(),
            role: "normal".into(),
        });
        let store = InMemoryIdentityStore::new();

        assert_eq!(
            bootstrap(&store, &doc, Utc::now()).unwrap_err(),
            AuthzError::MalformedPolicy("login 'localadmin' is defined more than once".into())
        );
        assert!(store.list_roles().unwrap().is_empty());
    }

    #[test]
    fn extra_roles_need_no_code_changes() {
        let doc = PolicyDocument::from_json(
            &json!({
                "roles": [{
                    "name": "installer",
                    "accessRights": crate::AccessRights::from_fn(|r, _| r == crate::Resource::Openers).to_value(),
                }]
            })
            .to_string(),
        )
        .unwrap();
        let store = InMemoryIdentityStore::new();
        let seeded = bootstrap(&store, &doc, Utc::now()).unwrap();

        let installer = store.resolve_role(&seeded.role_id("installer").unwrap()).unwrap();
        assert_eq!(
            crate::authorize(&installer, "openers", "delete"),
            Ok(crate::Decision::Allow)
        );
        assert!(seeded.principals.is_empty());
    }

    #[test]
    fn unknown_document_fields_are_rejected() {
        let err = PolicyDocument::from_json(r#"{"roles": [], "users": []}"#).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedPolicy(_)));
    }
}
