use serde::Serialize;

use shopfront_core::UserId;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
///
/// Built by the API layer from verified claims and its role policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn has_wildcard(&self) -> bool {
        self.permissions.iter().any(Permission::is_wildcard)
    }
}
