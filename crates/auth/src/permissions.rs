use serde::{Serialize, Serializer};

use crate::{Action, Resource};

/// A single cell of the access-rights matrix, written `resource.action`
/// (e.g. `"openers.create"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// All 25 permissions, resource-major.
    pub fn all() -> impl Iterator<Item = Permission> {
        Resource::ALL
            .into_iter()
            .flat_map(|r| Action::ALL.into_iter().map(move |a| Permission::new(r, a)))
    }

    pub fn description(&self) -> String {
        let verb = match self.action {
            Action::List => "List",
            Action::View => "View details of",
            Action::Create => "Create",
            Action::Edit => "Edit",
            Action::Delete => "Delete",
        };
        format!("{verb} {}", self.resource.label())
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
