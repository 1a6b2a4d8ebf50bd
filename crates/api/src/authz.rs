//! API-side authorization guard.
//!
//! Checked in handlers before a service is called; the services themselves
//! stay auth-agnostic.

use shopfront_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: principal.user_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Static role→permission policy.
///
/// `admin` grants everything; unknown roles grant nothing.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted = Vec::new();
    for role in roles {
        let perms = match role.as_str() {
            "admin" => return vec![Permission::WILDCARD],
            "pricing_manager" => vec![
                Permission::PRICING_READ,
                Permission::PRICING_ADJUST,
                Permission::CATALOG_READ,
            ],
            "catalog_manager" => vec![Permission::CATALOG_READ, Permission::CATALOG_WRITE],
            "protection_manager" => vec![
                Permission::PROTECTION_READ,
                Permission::PROTECTION_WRITE,
                Permission::CATALOG_READ,
            ],
            "viewer" => vec![
                Permission::CATALOG_READ,
                Permission::PRICING_READ,
                Permission::PROTECTION_READ,
            ],
            _ => Vec::new(),
        };
        for perm in perms {
            if !granted.contains(&perm) {
                granted.push(perm);
            }
        }
    }
    granted
}
