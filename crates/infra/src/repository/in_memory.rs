use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfront_catalog::{PricePatch, Product, ProductFilter};
use shopfront_core::{AdjustmentId, Entity, ExpectedVersion, Page, PlanId, ProductId};
use shopfront_pricing::{AdjustmentBatch, HistoryQuery, PriceAdjustmentRecord};
use shopfront_protection::ProtectionPlan;

use super::{
    AdjustmentHistoryRepository, ProductRepository, ProtectionPlanRepository, RepoResult,
    RepositoryError,
};

#[derive(Debug, Default)]
struct State {
    products: Vec<Product>,
    plans: Vec<ProtectionPlan>,
    adjustments: Vec<PriceAdjustmentRecord>,
}

/// In-memory store for tests/dev.
///
/// One lock guards every collection, so a bulk commit is observed either
/// entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Persistence("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Persistence("in-memory store lock poisoned".to_string()))
    }
}

fn position<E: Entity>(items: &[E], id: &E::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

fn find<'a, E: Entity>(items: &'a [E], id: &E::Id) -> Option<&'a E> {
    position(items, id).map(|idx| &items[idx])
}

fn sorted_plans<'a>(plans: impl Iterator<Item = &'a ProtectionPlan>) -> Vec<ProtectionPlan> {
    let mut plans: Vec<_> = plans.cloned().collect();
    plans.sort_by_key(|p| (p.sort_order, p.created_at, p.id));
    plans
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        let mut state = self.write()?;
        if position(&state.products, product.id()).is_some() {
            return Err(RepositoryError::Duplicate(format!("product {}", product.id)));
        }
        state.products.push(product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        Ok(find(&self.read()?.products, &id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| find(&state.products, id).cloned())
            .collect())
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        Ok(self
            .read()?
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: &PricePatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Product> {
        let mut state = self.write()?;
        let idx = position(&state.products, &id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        let product = &mut state.products[idx];
        if !expected.matches(product.version) {
            return Err(RepositoryError::Conflict(format!(
                "product {id}: expected {expected:?}, found version {}",
                product.version
            )));
        }
        product.apply_price_patch(patch, now);
        Ok(product.clone())
    }
}

#[async_trait]
impl ProtectionPlanRepository for InMemoryStore {
    async fn insert_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        let mut state = self.write()?;
        if position(&state.plans, plan.id()).is_some() {
            return Err(RepositoryError::Duplicate(format!("protection plan {}", plan.id)));
        }
        state.plans.push(plan.clone());
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> RepoResult<Option<ProtectionPlan>> {
        Ok(find(&self.read()?.plans, &id).cloned())
    }

    async fn list_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        Ok(sorted_plans(self.read()?.plans.iter()))
    }

    async fn list_active_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        Ok(sorted_plans(self.read()?.plans.iter().filter(|p| p.is_active)))
    }

    async fn update_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        let mut state = self.write()?;
        let idx = position(&state.plans, plan.id())
            .ok_or_else(|| RepositoryError::NotFound(format!("protection plan {}", plan.id)))?;
        state.plans[idx] = plan.clone();
        Ok(())
    }

    async fn delete_plan(&self, id: PlanId) -> RepoResult<()> {
        let mut state = self.write()?;
        let idx = position(&state.plans, &id)
            .ok_or_else(|| RepositoryError::NotFound(format!("protection plan {id}")))?;
        state.plans.remove(idx);
        Ok(())
    }
}

#[async_trait]
impl AdjustmentHistoryRepository for InMemoryStore {
    async fn commit_adjustment(&self, batch: &AdjustmentBatch) -> RepoResult<()> {
        let mut state = self.write()?;

        // Check every version before touching anything.
        let mut targets = Vec::with_capacity(batch.updates.len());
        for update in &batch.updates {
            let idx = position(&state.products, &update.product_id).ok_or_else(|| {
                RepositoryError::Conflict(format!("product {} no longer exists", update.product_id))
            })?;
            let actual = state.products[idx].version;
            if actual != update.expected_version {
                return Err(RepositoryError::Conflict(format!(
                    "product {}: expected version {}, found {actual}",
                    update.product_id, update.expected_version
                )));
            }
            targets.push(idx);
        }

        let now = batch.record.created_at;
        for (idx, update) in targets.into_iter().zip(&batch.updates) {
            state.products[idx].apply_price_patch(&update.patch, now);
        }
        state.adjustments.push(batch.record.clone());
        Ok(())
    }

    async fn get_adjustment(&self, id: AdjustmentId) -> RepoResult<Option<PriceAdjustmentRecord>> {
        Ok(find(&self.read()?.adjustments, &id).cloned())
    }

    async fn query_adjustments(&self, query: &HistoryQuery) -> RepoResult<Page<PriceAdjustmentRecord>> {
        let mut matching: Vec<_> = self
            .read()?
            .adjustments
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_vec(matching, query.pagination))
    }
}
