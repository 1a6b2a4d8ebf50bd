use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use shopfront_catalog::{NewProduct, PricePatch, Product, ProductFilter};
use shopfront_core::{AdjustmentId, ExpectedVersion, Page, PlanId, ProductId};
use shopfront_infra::{
    AdjustmentHistoryRepository, AdjustmentOutcome, CatalogService, InMemoryStore, PostgresStore,
    PriceAdjustmentService, ProductRepository, ProtectionPlanRepository, ProtectionService,
    ServiceResult,
};
use shopfront_pricing::{
    AdjustmentRule, BulkAdjustment, HistoryQuery, PriceAdjustmentLine, PriceAdjustmentRecord,
};
use shopfront_protection::{ApplicablePlan, NewProtectionPlan, ProtectionPlan};

use crate::config::ApiConfig;

/// The three application services over one shared store.
pub struct Services<S> {
    pub catalog: CatalogService<S>,
    pub pricing: PriceAdjustmentService<S>,
    pub protection: ProtectionService<S>,
}

impl<S> Services<S>
where
    S: ProductRepository + ProtectionPlanRepository + AdjustmentHistoryRepository + Clone,
{
    pub fn new(store: S, conflict_retries: u32) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            pricing: PriceAdjustmentService::new(store.clone()).with_conflict_retries(conflict_retries),
            protection: ProtectionService::new(store),
        }
    }
}

pub enum AppServices {
    InMemory(Services<Arc<InMemoryStore>>),
    Postgres(Services<Arc<PostgresStore>>),
}

macro_rules! delegate {
    ($self:ident, $s:ident => $call:expr) => {
        match $self {
            AppServices::InMemory($s) => $call,
            AppServices::Postgres($s) => $call,
        }
    };
}

impl AppServices {
    pub fn in_memory(conflict_retries: u32) -> Self {
        AppServices::InMemory(Services::new(Arc::new(InMemoryStore::new()), conflict_retries))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory(_) => "in_memory",
            AppServices::Postgres(_) => "postgres",
        }
    }

    // --- catalog ---

    pub async fn create_product(&self, new: NewProduct) -> ServiceResult<Product> {
        delegate!(self, s => s.catalog.create_product(new).await)
    }

    pub async fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        delegate!(self, s => s.catalog.get_product(id).await)
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> ServiceResult<Vec<Product>> {
        delegate!(self, s => s.catalog.list_products(filter).await)
    }

    pub async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: PricePatch,
    ) -> ServiceResult<Product> {
        delegate!(self, s => s.catalog.update_prices(id, expected, patch).await)
    }

    // --- pricing ---

    pub async fn apply_adjustment(&self, request: BulkAdjustment) -> ServiceResult<AdjustmentOutcome> {
        delegate!(self, s => s.pricing.apply(request).await)
    }

    pub async fn preview_adjustment(
        &self,
        product_ids: &[ProductId],
        rule: AdjustmentRule,
    ) -> ServiceResult<Vec<PriceAdjustmentLine>> {
        delegate!(self, s => s.pricing.preview(product_ids, rule).await)
    }

    pub async fn adjustment_history(
        &self,
        query: HistoryQuery,
    ) -> ServiceResult<Page<PriceAdjustmentRecord>> {
        delegate!(self, s => s.pricing.history(query).await)
    }

    pub async fn get_adjustment(&self, id: AdjustmentId) -> ServiceResult<PriceAdjustmentRecord> {
        delegate!(self, s => s.pricing.get(id).await)
    }

    // --- protection ---

    pub async fn applicable_plans(
        &self,
        product_id: ProductId,
        product_price: Option<Decimal>,
    ) -> ServiceResult<Vec<ApplicablePlan>> {
        delegate!(self, s => s.protection.resolve(product_id, product_price).await)
    }

    pub async fn create_plan(&self, new: NewProtectionPlan) -> ServiceResult<ProtectionPlan> {
        delegate!(self, s => s.protection.create_plan(new).await)
    }

    pub async fn update_plan(&self, id: PlanId, new: NewProtectionPlan) -> ServiceResult<ProtectionPlan> {
        delegate!(self, s => s.protection.update_plan(id, new).await)
    }

    pub async fn get_plan(&self, id: PlanId) -> ServiceResult<ProtectionPlan> {
        delegate!(self, s => s.protection.get_plan(id).await)
    }

    pub async fn list_plans(&self) -> ServiceResult<Vec<ProtectionPlan>> {
        delegate!(self, s => s.protection.list_plans().await)
    }

    pub async fn delete_plan(&self, id: PlanId) -> ServiceResult<()> {
        delegate!(self, s => s.protection.delete_plan(id).await)
    }
}

/// Wire the services for the configured backend.
///
/// With a `DATABASE_URL` this connects to Postgres and runs pending
/// migrations; otherwise everything lives in memory.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set; using in-memory store");
        return Ok(AppServices::in_memory(config.conflict_retries));
    };

    let store = PostgresStore::connect(url, config.database_max_connections)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to postgres");

    Ok(AppServices::Postgres(Services::new(
        Arc::new(store),
        config.conflict_retries,
    )))
}
