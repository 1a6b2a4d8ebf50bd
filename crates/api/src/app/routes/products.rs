use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use shopfront_auth::Permission;
use shopfront_core::ProductId;

use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/prices", patch(update_prices))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let new = match body.into_new_product() {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    let cmd_auth = CmdAuth {
        inner: new,
        required: vec![Permission::CATALOG_WRITE],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services.create_product(cmd_auth.inner).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::ProductResponse::from(product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::ProductListParams>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::CATALOG_READ) {
        return res;
    }
    let filter = match params.into_filter() {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    match services.list_products(&filter).await {
        Ok(products) => {
            let items = products
                .into_iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::CATALOG_READ) {
        return res;
    }
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(dto::ProductResponse::from(product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_prices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePricesRequest>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    let cmd_auth = CmdAuth {
        inner: body.into_parts(),
        required: vec![Permission::CATALOG_WRITE],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    let (expected, patch) = cmd_auth.inner;
    match services.update_prices(id, expected, patch).await {
        Ok(product) => (StatusCode::OK, Json(dto::ProductResponse::from(product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
