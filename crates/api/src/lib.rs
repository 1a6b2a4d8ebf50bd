//! `shopfront-api`: HTTP surface for the back office and the storefront.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
