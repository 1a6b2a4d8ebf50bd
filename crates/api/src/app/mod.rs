//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the application services over it
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: camelCase request/response DTOs and their domain mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    tracing::info!(backend = services.backend(), "services ready");
    Ok(router(&config.jwt_secret, services))
}

/// Router over already-built services.
pub fn router(jwt_secret: &str, services: AppServices) -> Router {
    let jwt = Arc::new(shopfront_auth::Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(Arc::new(services))),
        )
}
