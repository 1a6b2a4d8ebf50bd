//! Storage boundary for products, protection plans and adjustment history.
//!
//! Two backends implement every trait: [`InMemoryStore`] for tests and local
//! development, and [`PostgresStore`] for production.
//!
//! ## Atomicity
//!
//! [`AdjustmentHistoryRepository::commit_adjustment`] writes every product
//! patch of a bulk adjustment together with its audit record. Each patch is
//! guarded by the product version it was computed from; a single stale
//! version aborts the whole batch with [`RepositoryError::Conflict`] and
//! nothing is written.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use shopfront_catalog::{PricePatch, Product, ProductFilter};
use shopfront_core::{AdjustmentId, ExpectedVersion, Page, PlanId, ProductId};
use shopfront_pricing::{AdjustmentBatch, HistoryQuery, PriceAdjustmentRecord};
use shopfront_protection::ProtectionPlan;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> RepoResult<()>;

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;

    /// Products for `ids` in request order; unknown ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>>;

    /// Matching products in creation order.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>>;

    /// Single-product price edit guarded by `expected`.
    async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: &PricePatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Product>;
}

#[async_trait]
pub trait ProtectionPlanRepository: Send + Sync {
    async fn insert_plan(&self, plan: &ProtectionPlan) -> RepoResult<()>;

    async fn get_plan(&self, id: PlanId) -> RepoResult<Option<ProtectionPlan>>;

    /// All plans, active or not, ordered by `sort_order` then creation.
    async fn list_plans(&self) -> RepoResult<Vec<ProtectionPlan>>;

    /// Active plans only, same ordering as [`Self::list_plans`].
    async fn list_active_plans(&self) -> RepoResult<Vec<ProtectionPlan>>;

    async fn update_plan(&self, plan: &ProtectionPlan) -> RepoResult<()>;

    async fn delete_plan(&self, id: PlanId) -> RepoResult<()>;
}

/// Append-only adjustment audit log plus the atomic bulk commit.
#[async_trait]
pub trait AdjustmentHistoryRepository: Send + Sync {
    async fn commit_adjustment(&self, batch: &AdjustmentBatch) -> RepoResult<()>;

    async fn get_adjustment(&self, id: AdjustmentId) -> RepoResult<Option<PriceAdjustmentRecord>>;

    /// Newest first.
    async fn query_adjustments(&self, query: &HistoryQuery) -> RepoResult<Page<PriceAdjustmentRecord>>;
}

#[async_trait]
impl<S> ProductRepository for Arc<S>
where
    S: ProductRepository + ?Sized,
{
    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        (**self).insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        (**self).get_product(id).await
    }

    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>> {
        (**self).get_products(ids).await
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        (**self).list_products(filter).await
    }

    async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: &PricePatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Product> {
        (**self).update_prices(id, expected, patch, now).await
    }
}

#[async_trait]
impl<S> ProtectionPlanRepository for Arc<S>
where
    S: ProtectionPlanRepository + ?Sized,
{
    async fn insert_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        (**self).insert_plan(plan).await
    }

    async fn get_plan(&self, id: PlanId) -> RepoResult<Option<ProtectionPlan>> {
        (**self).get_plan(id).await
    }

    async fn list_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        (**self).list_plans().await
    }

    async fn list_active_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        (**self).list_active_plans().await
    }

    async fn update_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        (**self).update_plan(plan).await
    }

    async fn delete_plan(&self, id: PlanId) -> RepoResult<()> {
        (**self).delete_plan(id).await
    }
}

#[async_trait]
impl<S> AdjustmentHistoryRepository for Arc<S>
where
    S: AdjustmentHistoryRepository + ?Sized,
{
    async fn commit_adjustment(&self, batch: &AdjustmentBatch) -> RepoResult<()> {
        (**self).commit_adjustment(batch).await
    }

    async fn get_adjustment(&self, id: AdjustmentId) -> RepoResult<Option<PriceAdjustmentRecord>> {
        (**self).get_adjustment(id).await
    }

    async fn query_adjustments(&self, query: &HistoryQuery) -> RepoResult<Page<PriceAdjustmentRecord>> {
        (**self).query_adjustments(query).await
    }
}
