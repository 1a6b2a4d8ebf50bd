use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Permissions a command needs before it may be dispatched.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfront_core::UserId;

    use crate::Role;

    fn principal(perms: &[Permission]) -> Principal {
        Principal {
            user_id: UserId::new(),
            roles: vec![Role::new("viewer")],
            permissions: perms.to_vec(),
        }
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(&[Permission::new("*")]);
        assert!(p.has_wildcard());
        assert_eq!(authorize(&p, &Permission::PRICING_ADJUST), Ok(()));
    }

    #[test]
    fn explicit_permission_is_required() {
        let p = principal(&[Permission::PRICING_READ]);
        assert_eq!(authorize(&p, &Permission::PRICING_READ), Ok(()));
        assert_eq!(
            authorize(&p, &Permission::PRICING_ADJUST),
            Err(AuthzError::Forbidden("pricing.adjust".to_string()))
        );
    }

    #[test]
    fn no_permissions_denies() {
        let p = principal(&[]);
        assert!(authorize(&p, &Permission::CATALOG_READ).is_err());
    }
}
