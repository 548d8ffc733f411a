//! Access-rights matrix: a total mapping (resource × action) → bool.
//!
//! Stored documents are nested JSON objects keyed by collection name and then
//! by action name. Parsing is strict: every resource and every action must be
//! present with a boolean value, and unknown keys are rejected. There is no
//! default in either direction.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Action, AuthzError, Resource};

/// Permission flags for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ActionRights {
    pub list: bool,
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

impl ActionRights {
    pub const NONE: ActionRights = ActionRights {
        list: false,
        view: false,
        create: false,
        edit: false,
        delete: false,
    };

    pub const ALL: ActionRights = ActionRights {
        list: true,
        view: true,
        create: true,
        edit: true,
        delete: true,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::List => self.list,
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }

    /// Copy of `self` with one flag replaced.
    pub fn with(mut self, action: Action, allowed: bool) -> Self {
        let slot = match action {
            Action::List => &mut self.list,
            Action::View => &mut self.view,
            Action::Create => &mut self.create,
            Action::Edit => &mut self.edit,
            Action::Delete => &mut self.delete,
        };
        *slot = allowed;
        self
    }

    /// Granted actions in declaration order.
    pub fn granted(&self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.allows(*a)).collect()
    }

    fn from_value(resource: Resource, value: &Value) -> Result<Self, AuthzError> {
        let entry = expect_object(value, resource.as_str())?;

        if let Some(unknown) = entry.keys().find(|k| k.parse::<Action>().is_err()) {
            return Err(AuthzError::malformed(format!(
                "{resource}.{unknown}: unknown action"
            )));
        }

        let flag = |action: Action| -> Result<bool, AuthzError> {
            match entry.get(action.as_str()) {
                None => Err(AuthzError::malformed(format!(
                    "{resource}.{action}: missing action"
                ))),
                Some(Value::Bool(b)) => Ok(*b),
                Some(other) => Err(AuthzError::malformed(format!(
                    "{resource}.{action}: expected boolean, found {other}"
                ))),
            }
        };

        Ok(ActionRights {
            list: flag(Action::List)?,
            view: flag(Action::View)?,
            create: flag(Action::Create)?,
            edit: flag(Action::Edit)?,
            delete: flag(Action::Delete)?,
        })
    }
}

/// The complete matrix for one role.
///
/// Values of this type are always total; the only ways to build one are the
/// strict parser and constructors that cover every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRights {
    users: ActionRights,
    roles: ActionRights,
    openers: ActionRights,
    barrier_manufacturers: ActionRights,
    barrier_models: ActionRights,
}

impl AccessRights {
    /// Matrix granting every action on every resource.
    pub fn full() -> Self {
        Self::from_fn(|_, _| true)
    }

    /// Matrix denying every action on every resource.
    pub fn empty() -> Self {
        Self::from_fn(|_, _| false)
    }

    /// Build a matrix by evaluating `f` on every cell.
    pub fn from_fn(f: impl Fn(Resource, Action) -> bool) -> Self {
        let row = |resource: Resource| {
            Action::ALL
                .into_iter()
                .fold(ActionRights::NONE, |acc, action| {
                    acc.with(action, f(resource, action))
                })
        };
        Self {
            users: row(Resource::Users),
            roles: row(Resource::Roles),
            openers: row(Resource::Openers),
            barrier_manufacturers: row(Resource::BarrierManufacturers),
            barrier_models: row(Resource::BarrierModels),
        }
    }

    /// Parse a stored `accessRights` document.
    pub fn from_value(value: &Value) -> Result<Self, AuthzError> {
        let doc = expect_object(value, "accessRights")?;

        if let Some(unknown) = doc.keys().find(|k| k.parse::<Resource>().is_err()) {
            return Err(AuthzError::malformed(format!("{unknown}: unknown resource")));
        }

        let row = |resource: Resource| -> Result<ActionRights, AuthzError> {
            let entry = doc.get(resource.as_str()).ok_or_else(|| {
                AuthzError::malformed(format!("{resource}: missing resource entry"))
            })?;
            ActionRights::from_value(resource, entry)
        };

        Ok(Self {
            users: row(Resource::Users)?,
            roles: row(Resource::Roles)?,
            openers: row(Resource::Openers)?,
            barrier_manufacturers: row(Resource::BarrierManufacturers)?,
            barrier_models: row(Resource::BarrierModels)?,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        for resource in Resource::ALL {
            let rights = self.rights(resource);
            let row: Map<String, Value> = Action::ALL
                .into_iter()
                .map(|a| (a.as_str().to_string(), Value::Bool(rights.allows(a))))
                .collect();
            doc.insert(resource.as_str().to_string(), Value::Object(row));
        }
        Value::Object(doc)
    }

    pub fn rights(&self, resource: Resource) -> &ActionRights {
        match resource {
            Resource::Users => &self.users,
            Resource::Roles => &self.roles,
            Resource::Openers => &self.openers,
            Resource::BarrierManufacturers => &self.barrier_manufacturers,
            Resource::BarrierModels => &self.barrier_models,
        }
    }

    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.rights(resource).allows(action)
    }

    /// Copy of `self` with one cell replaced.
    pub fn with(mut self, resource: Resource, action: Action, allowed: bool) -> Self {
        let row = match resource {
            Resource::Users => &mut self.users,
            Resource::Roles => &mut self.roles,
            Resource::Openers => &mut self.openers,
            Resource::BarrierManufacturers => &mut self.barrier_manufacturers,
            Resource::BarrierModels => &mut self.barrier_models,
        };
        *row = row.with(action, allowed);
        self
    }

    /// Every granted (resource, action) pair.
    pub fn granted(&self) -> Vec<(Resource, Action)> {
        Resource::ALL
            .into_iter()
            .flat_map(|r| self.rights(r).granted().into_iter().map(move |a| (r, a)))
            .collect()
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, AuthzError> {
    value
        .as_object()
        .ok_or_else(|| AuthzError::malformed(format!("{path}: expected an object, found {value}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn complete_document() -> Value {
        AccessRights::from_fn(|r, a| r == Resource::Openers && a != Action::Delete).to_value()
    }

    #[test]
    fn parses_complete_document() {
        let rights = AccessRights::from_value(&complete_document()).unwrap();

        assert!(rights.allows(Resource::Openers, Action::Create));
        assert!(!rights.allows(Resource::Openers, Action::Delete));
        assert!(!rights.allows(Resource::Users, Action::List));
    }

    #[test]
    fn missing_action_names_the_cell() {
        let mut doc = complete_document();
        doc["barrierModels"].as_object_mut().unwrap().remove("delete");

        let err = AccessRights::from_value(&doc).unwrap_err();
        assert_eq!(
            err,
            AuthzError::MalformedPolicy("barrierModels.delete: missing action".into())
        );
    }

    #[test]
    fn missing_resource_is_malformed() {
        let mut doc = complete_document();
        doc.as_object_mut().unwrap().remove("users");

        let err = AccessRights::from_value(&doc).unwrap_err();
        assert_eq!(
            err,
            AuthzError::MalformedPolicy("users: missing resource entry".into())
        );
    }

    #[test]
    fn non_boolean_flag_is_malformed() {
        let mut doc = complete_document();
        doc["roles"]["view"] = json!("yes");

        let err = AccessRights::from_value(&doc).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedPolicy(msg) if msg.starts_with("roles.view")));
    }

    #[test]
    fn unknown_keys_are_malformed() {
        let mut doc = complete_document();
        doc["openers"]["open"] = json!(true);
        assert!(matches!(
            AccessRights::from_value(&doc),
            Err(AuthzError::MalformedPolicy(msg)) if msg == "openers.open: unknown action"
        ));

        let mut doc = complete_document();
        doc["clients"] =
            json!({ "list": true, "view": true, "create": true, "edit": true, "delete": true });
        assert!(matches!(
            AccessRights::from_value(&doc),
            Err(AuthzError::MalformedPolicy(msg)) if msg == "clients: unknown resource"
        ));
    }

    #[test]
    fn non_object_document_is_malformed() {
        assert!(matches!(
            AccessRights::from_value(&json!([])),
            Err(AuthzError::MalformedPolicy(_))
        ));
        assert!(matches!(
            AccessRights::from_value(&json!({ "users": true })),
            Err(AuthzError::MalformedPolicy(msg)) if msg.starts_with("users:")
        ));
    }

    #[test]
    fn with_replaces_a_single_cell() {
        let rights = AccessRights::empty().with(Resource::Roles, Action::Edit, true);

        assert_eq!(rights.granted(), vec![(Resource::Roles, Action::Edit)]);
    }

    #[test]
    fn serialize_matches_stored_shape() {
        let rights = AccessRights::full();
        assert_eq!(serde_json::to_value(rights).unwrap(), rights.to_value());
    }
}
