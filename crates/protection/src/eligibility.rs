use rust_decimal::Decimal;
use serde::Serialize;

use shopfront_catalog::{CategoryPath, Product};
use shopfront_core::{DomainError, DomainResult, round2};

use crate::plan::{CategoryScope, PlanPricing, PlanScope, ProtectionPlan};

/// An applicable plan annotated with its price for the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicablePlan {
    pub plan: ProtectionPlan,
    pub calculated_price: Decimal,
}

impl CategoryScope {
    /// Every constrained depth must contain the product's category at that
    /// depth, and at least one depth must be constrained.
    ///
    /// A scope with no categories selected at all matches nothing.
    pub fn matches(&self, path: &CategoryPath) -> bool {
        let mut constrained = false;
        for (depth, allowed) in self.levels().iter().enumerate() {
            if allowed.is_empty() {
                continue;
            }
            constrained = true;
            match path.at(depth) {
                Some(category) if allowed.contains(&category) => {}
                _ => return false,
            }
        }
        constrained
    }
}

impl PlanScope {
    pub fn applies_to(&self, product: &Product) -> bool {
        match self {
            PlanScope::All => true,
            PlanScope::Categories { levels } => levels.matches(&product.categories),
            PlanScope::Products { product_ids } => product_ids.contains(&product.id),
        }
    }
}

impl PlanPricing {
    /// Price of the plan for a product costing `product_price`, rounded to 2 dp.
    pub fn price_for(&self, product_price: Decimal) -> DomainResult<Decimal> {
        match *self {
            PlanPricing::Fixed { price } => Ok(round2(price)),
            PlanPricing::Percentage {
                percentage,
                min_price,
                max_price,
            } => {
                let mut price = product_price
                    .checked_mul(percentage)
                    .map(|p| p / Decimal::ONE_HUNDRED)
                    .ok_or_else(|| DomainError::validation("product price is out of range"))?;
                if let Some(min) = min_price {
                    if price < min {
                        price = min;
                    }
                }
                if let Some(max) = max_price {
                    if price > max {
                        price = max;
                    }
                }
                Ok(round2(price))
            }
        }
    }
}

/// Active plans that apply to `product`, priced for `product_price`.
///
/// Ordered by `sort_order`, ties broken by creation order.
pub fn resolve_applicable_plans(
    product: &Product,
    product_price: Decimal,
    plans: impl IntoIterator<Item = ProtectionPlan>,
) -> DomainResult<Vec<ApplicablePlan>> {
    if product_price < Decimal::ZERO {
        return Err(DomainError::validation("product price cannot be negative"));
    }

    let mut applicable = plans
        .into_iter()
        .filter(|plan| plan.is_active && plan.scope.applies_to(product))
        .map(|plan| {
            let calculated_price = plan.pricing.price_for(product_price)?;
            Ok(ApplicablePlan {
                plan,
                calculated_price,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    applicable.sort_by(|a, b| {
        (a.plan.sort_order, a.plan.created_at, a.plan.id)
            .cmp(&(b.plan.sort_order, b.plan.created_at, b.plan.id))
    });
    Ok(applicable)
}
