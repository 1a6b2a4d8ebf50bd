use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shopfront_auth::Permission;
use shopfront_core::{AdjustmentId, Pagination, UserId};
use shopfront_pricing::{BulkAdjustment, HistoryQuery};

use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/bulk-update", post(bulk_update))
        .route("/preview", post(preview))
        .route("/history", get(history))
        .route("/history/:id", get(get_adjustment))
}

pub async fn bulk_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AdjustmentRequest>,
) -> axum::response::Response {
    let (product_ids, rule) = match body.product_ids().and_then(|ids| Ok((ids, body.rule()?))) {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    let cmd = BulkAdjustment {
        product_ids,
        rule,
        notes: body.notes.filter(|n| !n.trim().is_empty()),
        filter_criteria: body.filter_criteria,
        performed_by: principal.user_id(),
    };

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::PRICING_ADJUST],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services.apply_adjustment(cmd_auth.inner).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::BulkUpdateResponse::from(outcome))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AdjustmentRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PRICING_ADJUST) {
        return res;
    }
    let (product_ids, rule) = match body.product_ids().and_then(|ids| Ok((ids, body.rule()?))) {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    match services.preview_adjustment(&product_ids, rule).await {
        Ok(lines) => {
            let items = lines
                .into_iter()
                .map(dto::AdjustmentLineResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::HistoryParams>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PRICING_READ) {
        return res;
    }
    let performed_by = match dto::parse_optional_id::<UserId>(params.performed_by.as_deref(), "performedBy") {
        Ok(v) => v,
        Err(e) => return errors::request_error_to_response(e),
    };

    let query = HistoryQuery {
        from: params.from,
        to: params.to,
        performed_by,
        pagination: Pagination::new(params.limit, params.offset),
    };

    match services.adjustment_history(query).await {
        Ok(page) => {
            let body: dto::PageResponse<dto::AdjustmentRecordResponse> = dto::PageResponse::from_page(page);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, Permission::PRICING_READ) {
        return res;
    }
    let id: AdjustmentId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("adjustment"),
    };

    match services.get_adjustment(id).await {
        Ok(record) => (StatusCode::OK, Json(dto::AdjustmentRecordResponse::from(record))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
