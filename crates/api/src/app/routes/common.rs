use axum::response::Response;

use shopfront_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Guard for reads, which carry no command.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    let query = CmdAuth {
        inner: (),
        required: vec![permission],
    };
    crate::authz::authorize_command(principal, &query).map_err(errors::forbidden)
}
