use axum::{routing::get, Router};

pub mod common;
pub mod pricing;
pub mod products;
pub mod protection;
pub mod storefront;
pub mod system;

/// Router for all authenticated back-office endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/pricing", pricing::router())
        .nest("/protection", protection::router())
}

/// Router for endpoints that need no token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/storefront", storefront::router())
}
