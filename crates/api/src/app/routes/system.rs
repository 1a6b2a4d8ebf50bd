use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::authz::permissions_from_roles;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let permissions = permissions_from_roles(principal.roles());
    Json(serde_json::json!({
        "userId": principal.user_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
