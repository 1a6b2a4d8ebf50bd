//! `shopfront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod page;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AdjustmentId, BrandId, CategoryId, PlanId, ProductId, UserId};
pub use money::{percentage_change, round2};
pub use page::{Page, Pagination};
pub use version::ExpectedVersion;
