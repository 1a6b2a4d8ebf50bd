use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use shopfront_core::{PlanId, ProductId};
use shopfront_protection::{ApplicablePlan, NewProtectionPlan, ProtectionPlan, resolve_applicable_plans};

use super::{ServiceError, ServiceResult};
use crate::repository::{ProductRepository, ProtectionPlanRepository};

/// Protection plan administration and the storefront eligibility lookup.
#[derive(Debug, Clone)]
pub struct ProtectionService<S> {
    store: S,
}

impl<S> ProtectionService<S>
where
    S: ProductRepository + ProtectionPlanRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Active plans offered for a product, priced for `product_price`.
    ///
    /// Without an explicit price the product's effective price is used.
    #[instrument(skip(self), err)]
    pub async fn resolve(
        &self,
        product_id: ProductId,
        product_price: Option<Decimal>,
    ) -> ServiceResult<Vec<ApplicablePlan>> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id} not found")))?;
        let price = product_price.unwrap_or_else(|| product.effective_price());

        let plans = self.store.list_active_plans().await?;
        Ok(resolve_applicable_plans(&product, price, plans)?)
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub async fn create_plan(&self, new: NewProtectionPlan) -> ServiceResult<ProtectionPlan> {
        let plan = ProtectionPlan::create(new, Utc::now())?;
        self.store.insert_plan(&plan).await?;
        tracing::info!(plan_id = %plan.id, "protection plan created");
        Ok(plan)
    }

    /// Full replacement of a plan's configuration.
    #[instrument(skip(self, new), err)]
    pub async fn update_plan(&self, id: PlanId, new: NewProtectionPlan) -> ServiceResult<ProtectionPlan> {
        let mut plan = self.get_plan(id).await?;
        plan.replace(new, Utc::now())?;
        self.store.update_plan(&plan).await?;
        tracing::info!(plan_id = %id, "protection plan updated");
        Ok(plan)
    }

    #[instrument(skip(self), err)]
    pub async fn get_plan(&self, id: PlanId) -> ServiceResult<ProtectionPlan> {
        self.store
            .get_plan(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("protection plan {id} not found")))
    }

    #[instrument(skip(self), err)]
    pub async fn list_plans(&self) -> ServiceResult<Vec<ProtectionPlan>> {
        Ok(self.store.list_plans().await?)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_plan(&self, id: PlanId) -> ServiceResult<()> {
        self.store.delete_plan(id).await?;
        tracing::info!(plan_id = %id, "protection plan deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use shopfront_catalog::{CategoryPath, NewProduct, Product};
    use shopfront_core::CategoryId;
    use shopfront_protection::{CategoryScope, PlanPricing, PlanScope, ProtectionType};

    use crate::repository::InMemoryStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn plan(name: &str, pricing: PlanPricing, scope: PlanScope, sort_order: i32) -> NewProtectionPlan {
        NewProtectionPlan {
            name: name.to_string(),
            protection_type: ProtectionType::DamageProtection,
            duration: "1 year".to_string(),
            description: None,
            is_active: true,
            sort_order,
            pricing,
            scope,
        }
    }

    async fn setup(parent: CategoryId) -> (ProtectionService<Arc<InMemoryStore>>, Product) {
        let store = Arc::new(InMemoryStore::new());
        let product = Product::create(
            NewProduct {
                name: "Phone".to_string(),
                sku: "PH-1".to_string(),
                brand_id: None,
                price: dec("6000"),
                offer_price: Some(dec("500")),
                categories: CategoryPath::with_parent(parent),
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_product(&product).await.unwrap();
        (ProtectionService::new(store), product)
    }

    fn clamped() -> PlanPricing {
        PlanPricing::Percentage {
            percentage: dec("5"),
            min_price: Some(dec("50")),
            max_price: Some(dec("200")),
        }
    }

    #[tokio::test]
    async fn resolve_uses_given_price_or_effective_price() {
        let parent = CategoryId::new();
        let (svc, product) = setup(parent).await;
        svc.create_plan(plan(
            "Screen",
            clamped(),
            PlanScope::Categories { levels: CategoryScope::parents([parent]) },
            0,
        ))
        .await
        .unwrap();

        let at_list = svc.resolve(product.id, Some(dec("6000"))).await.unwrap();
        assert_eq!(at_list[0].calculated_price, dec("200.00"));

        // Effective price is the 500 offer, so the 5% share is clamped up to 50.
        let at_effective = svc.resolve(product.id, None).await.unwrap();
        assert_eq!(at_effective[0].calculated_price, dec("50.00"));
    }

    #[tokio::test]
    async fn resolve_skips_inactive_and_out_of_scope_plans() {
        let parent = CategoryId::new();
        let (svc, product) = setup(parent).await;

        let mut inactive = plan("Old", PlanPricing::Fixed { price: dec("9") }, PlanScope::All, 0);
        inactive.is_active = false;
        svc.create_plan(inactive).await.unwrap();
        svc.create_plan(plan(
            "Other category",
            PlanPricing::Fixed { price: dec("9") },
            PlanScope::Categories { levels: CategoryScope::parents([CategoryId::new()]) },
            0,
        ))
        .await
        .unwrap();
        svc.create_plan(plan(
            "Unscoped categories",
            PlanPricing::Fixed { price: dec("9") },
            PlanScope::Categories { levels: CategoryScope::default() },
            0,
        ))
        .await
        .unwrap();
        let listed = svc
            .create_plan(plan(
                "Listed",
                PlanPricing::Fixed { price: dec("15") },
                PlanScope::Products { product_ids: [product.id].into_iter().collect() },
                1,
            ))
            .await
            .unwrap();

        let resolved = svc.resolve(product.id, None).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].plan.id, listed.id);
        assert_eq!(resolved[0].calculated_price, dec("15"));
    }

    #[tokio::test]
    async fn resolve_unknown_product_is_not_found() {
        let (svc, _) = setup(CategoryId::new()).await;
        assert!(matches!(
            svc.resolve(ProductId::new(), None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolve_rejects_negative_price() {
        let (svc, product) = setup(CategoryId::new()).await;
        assert!(matches!(
            svc.resolve(product.id, Some(dec("-1"))).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn plan_lifecycle() {
        let (svc, _) = setup(CategoryId::new()).await;
        let created = svc
            .create_plan(plan("Warranty", PlanPricing::Fixed { price: dec("20") }, PlanScope::All, 3))
            .await
            .unwrap();

        let mut replacement = plan("Warranty+", PlanPricing::Fixed { price: dec("25") }, PlanScope::All, 1);
        replacement.protection_type = ProtectionType::Warranty;
        let updated = svc.update_plan(created.id, replacement).await.unwrap();
        assert_eq!(updated.name, "Warranty+");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(svc.get_plan(created.id).await.unwrap(), updated);

        assert_eq!(svc.list_plans().await.unwrap().len(), 1);
        svc.delete_plan(created.id).await.unwrap();
        assert!(matches!(svc.get_plan(created.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.delete_plan(created.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected() {
        let (svc, _) = setup(CategoryId::new()).await;
        let err = svc
            .create_plan(plan("Broken", PlanPricing::Fixed { price: Decimal::ZERO }, PlanScope::All, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn list_orders_by_sort_order() {
        let (svc, _) = setup(CategoryId::new()).await;
        let second = svc
            .create_plan(plan("B", PlanPricing::Fixed { price: dec("1") }, PlanScope::All, 2))
            .await
            .unwrap();
        let first = svc
            .create_plan(plan("A", PlanPricing::Fixed { price: dec("1") }, PlanScope::All, 1))
            .await
            .unwrap();
        let ids: Vec<_> = svc.list_plans().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
