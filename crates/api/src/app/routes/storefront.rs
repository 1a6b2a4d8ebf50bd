//! Unauthenticated endpoints used by the shop front.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Router,
};

use crate::app::dto;
use crate::app::routes::protection::applicable_plans_response;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/products/:id/protection-plans", get(protection_plans))
}

pub async fn protection_plans(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(params): Query<dto::ProductPriceParams>,
) -> axum::response::Response {
    applicable_plans_response(&services, &id, &params).await
}
