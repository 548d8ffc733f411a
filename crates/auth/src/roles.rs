use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use acs_core::{AggregateRoot, DomainError, RoleId};

use crate::{AccessRights, AuthzError};

/// Persisted role document.
///
/// `accessRights` is kept as raw JSON so that validation happens in exactly one
/// place ([`Role::load`]) and a partial matrix can never be defaulted by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub name: String,
    pub access_rights: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An immutable role snapshot.
///
/// Edits never mutate a snapshot; [`Role::revise`] returns the next version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    id: RoleId,
    name: String,
    access_rights: AccessRights,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Role {
    pub fn new(
        id: RoleId,
        name: impl Into<String>,
        access_rights: AccessRights,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthzError> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            access_rights,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Build a role from its stored document, rejecting partial matrices.
    pub fn load(id: RoleId, record: RoleRecord) -> Result<Self, AuthzError> {
        let access_rights = AccessRights::from_value(&record.access_rights).map_err(|e| match e {
            AuthzError::MalformedPolicy(msg) => {
                AuthzError::malformed(format!("role '{}': {msg}", record.name))
            }
            other => other,
        })?;
        let name = validate_name(record.name)
            .map_err(|_| AuthzError::malformed("stored role has an empty name"))?;

        Ok(Self {
            id,
            name,
            access_rights,
            created_at: record.created_at,
            updated_at: record.updated_at.unwrap_or(record.created_at),
            version: 0,
        })
    }

    pub fn to_record(&self) -> RoleRecord {
        RoleRecord {
            name: self.name.clone(),
            access_rights: self.access_rights.to_value(),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        }
    }

    /// Next snapshot carrying `access_rights`, one version ahead.
    pub fn revise(&self, access_rights: AccessRights, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            access_rights,
            created_at: self.created_at,
            updated_at: now,
            version: self.version + 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access_rights(&self) -> &AccessRights {
        &self.access_rights
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl AggregateRoot for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn validate_name(name: String) -> Result<String, AuthzError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("role name must not be empty").into());
    }
    Ok(name)
}
