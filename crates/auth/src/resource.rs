//! Closed enumerations of protected resources and the actions on them.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// A protected collection.
///
/// The serialized form is the collection name used in stored access-rights
/// documents (`barrierManufacturers`, not `barrier_manufacturers`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Users,
    Roles,
    Openers,
    BarrierManufacturers,
    BarrierModels,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Users,
        Resource::Roles,
        Resource::Openers,
        Resource::BarrierManufacturers,
        Resource::BarrierModels,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Openers => "openers",
            Resource::BarrierManufacturers => "barrierManufacturers",
            Resource::BarrierModels => "barrierModels",
        }
    }

    /// Human-readable plural used in audit output.
    pub fn label(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Openers => "openers",
            Resource::BarrierManufacturers => "barrier manufacturers",
            Resource::BarrierModels => "barrier models",
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AuthzError::invalid_request(format!("unknown resource '{s}'")))
    }
}

/// A CRUD-style operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::List,
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AuthzError::invalid_request(format!("unknown action '{s}'")))
    }
}
