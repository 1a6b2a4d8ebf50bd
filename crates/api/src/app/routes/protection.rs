use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use shopfront_auth::Permission;
use shopfront_core::{PlanId, ProductId};
use shopfront_protection::NewProtectionPlan;

use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/:id", get(get_plan).put(update_plan).delete(delete_plan))
        .route("/products/:id/plans", get(product_plans))
}

pub async fn create_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PlanRequest>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: NewProtectionPlan::from(body),
        required: vec![Permission::PROTECTION_WRITE],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services.create_plan(cmd_auth.inner).await {
        Ok(plan) => (StatusCode::CREATED, Json(dto::PlanResponse::from(plan))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PlanRequest>,
) -> axum::response::Response {
    let id: PlanId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("plan"),
    };

    let cmd_auth = CmdAuth {
        inner: NewProtectionPlan::from(body),
        required: vec![Permission::PROTECTION_WRITE],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services.update_plan(id, cmd_auth.inner).await {
        Ok(plan) => (StatusCode::OK, Json(dto::PlanResponse::from(plan))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PROTECTION_WRITE) {
        return res;
    }
    let id: PlanId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("plan"),
    };

    match services.delete_plan(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PROTECTION_READ) {
        return res;
    }
    let id: PlanId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("plan"),
    };

    match services.get_plan(id).await {
        Ok(plan) => (StatusCode::OK, Json(dto::PlanResponse::from(plan))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_plans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PROTECTION_READ) {
        return res;
    }

    match services.list_plans().await {
        Ok(plans) => {
            let items = plans
                .into_iter()
                .map(dto::PlanResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Back-office view of the storefront lookup.
pub async fn product_plans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(params): Query<dto::ProductPriceParams>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PROTECTION_READ) {
        return res;
    }
    applicable_plans_response(&services, &id, &params).await
}

/// Shared by the admin and storefront lookups.
pub async fn applicable_plans_response(
    services: &AppServices,
    id: &str,
    params: &dto::ProductPriceParams,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let price = match params.price() {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    match services.applicable_plans(product_id, price).await {
        Ok(plans) => {
            let items = plans
                .into_iter()
                .map(dto::ApplicablePlanResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
