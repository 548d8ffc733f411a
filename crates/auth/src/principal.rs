use serde::{Deserialize, Serialize};

use acs_core::{PrincipalId, RoleId};

/// An authenticated actor as the identity store knows it.
///
/// The role is held by reference only; it is resolved through an
/// [`IdentityStore`](crate::IdentityStore) whenever a decision is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub login: String,
    pub role_id: RoleId,
}

impl Principal {
    pub fn new(principal_id: PrincipalId, login: impl Into<String>, role_id: RoleId) -> Self {
        Self {
            principal_id,
            login: login.into(),
            role_id,
        }
    }
}
