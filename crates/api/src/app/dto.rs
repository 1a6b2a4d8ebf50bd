//! Request/response DTOs and their mapping to domain types.
//!
//! The wire format is camelCase; domain types keep their own serde shape for
//! storage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_catalog::{CategoryPath, NewProduct, PricePatch, Product, ProductFilter};
use shopfront_core::{
    AdjustmentId, BrandId, CategoryId, DomainError, DomainResult, ExpectedVersion, Page, PlanId,
    ProductId, UserId,
};
use shopfront_infra::AdjustmentOutcome;
use shopfront_pricing::{
    AdjustmentMethod, AdjustmentRule, AdjustmentType, FilterCriteria, PriceAdjustmentLine,
    PriceAdjustmentRecord,
};
use shopfront_protection::{
    ApplicablePlan, CategoryScope, NewProtectionPlan, PlanPricing, PlanScope, ProtectionPlan,
    ProtectionType,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub brand_id: Option<BrandId>,
    pub price: Decimal,
    #[serde(default)]
    pub offer_price: Option<Decimal>,
    /// Category id per depth, parent first.
    #[serde(default)]
    pub category_ids: Vec<Option<CategoryId>>,
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> DomainResult<NewProduct> {
        Ok(NewProduct {
            name: self.name,
            sku: self.sku,
            brand_id: self.brand_id,
            price: self.price,
            offer_price: self.offer_price,
            categories: CategoryPath::new(self.category_ids)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePricesRequest {
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub offer_price: Option<Decimal>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl UpdatePricesRequest {
    pub fn into_parts(self) -> (ExpectedVersion, PricePatch) {
        let expected = self
            .expected_version
            .map_or(ExpectedVersion::Any, ExpectedVersion::Exact);
        let patch = PricePatch {
            price: self.price,
            offer_price: self.offer_price,
        };
        (expected, patch)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub brand_id: Option<String>,
    pub search: Option<String>,
}

impl ProductListParams {
    pub fn into_filter(self) -> DomainResult<ProductFilter> {
        Ok(ProductFilter {
            category_id: parse_optional_id(self.category_id.as_deref(), "categoryId")?,
            subcategory_id: parse_optional_id(self.subcategory_id.as_deref(), "subcategoryId")?,
            brand_id: parse_optional_id(self.brand_id.as_deref(), "brandId")?,
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Body of both the bulk update and its preview.
///
/// The rule fields are optional here so that a missing one is reported as a
/// validation error rather than a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    #[serde(default)]
    pub product_ids: Vec<String>,
    pub adjustment_type: Option<AdjustmentType>,
    pub adjustment_method: Option<AdjustmentMethod>,
    pub adjustment_value: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub filter_criteria: FilterCriteria,
}

impl AdjustmentRequest {
    pub fn rule(&self) -> DomainResult<AdjustmentRule> {
        let adjustment_type = self
            .adjustment_type
            .ok_or_else(|| DomainError::validation("adjustmentType is required"))?;
        let method = self
            .adjustment_method
            .ok_or_else(|| DomainError::validation("adjustmentMethod is required"))?;
        let value = self
            .adjustment_value
            .ok_or_else(|| DomainError::validation("adjustmentValue is required"))?;
        Ok(AdjustmentRule {
            adjustment_type,
            method,
            value,
        })
    }

    pub fn product_ids(&self) -> DomainResult<Vec<ProductId>> {
        self.product_ids
            .iter()
            .map(|raw| {
                raw.parse::<ProductId>()
                    .map_err(|_| DomainError::invalid_id(format!("invalid product id '{raw}'")))
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub performed_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceParams {
    pub product_price: Option<String>,
}

impl ProductPriceParams {
    pub fn price(&self) -> DomainResult<Option<Decimal>> {
        self.product_price
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .parse::<Decimal>()
                    .map_err(|_| DomainError::validation(format!("invalid productPrice '{raw}'")))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanPricingDto {
    Fixed {
        price: Decimal,
    },
    Percentage {
        percentage: Decimal,
        #[serde(default)]
        min_price: Option<Decimal>,
        #[serde(default)]
        max_price: Option<Decimal>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "appliesTo", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanScopeDto {
    All,
    /// Category ids per depth, parent categories first.
    Categories {
        levels: CategoryScope,
    },
    Products {
        product_ids: BTreeSet<ProductId>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub name: String,
    pub protection_type: ProtectionType,
    pub duration: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: i32,
    pub pricing: PlanPricingDto,
    pub scope: PlanScopeDto,
}

impl From<PlanRequest> for NewProtectionPlan {
    fn from(req: PlanRequest) -> Self {
        NewProtectionPlan {
            name: req.name,
            protection_type: req.protection_type,
            duration: req.duration,
            description: req.description,
            is_active: req.is_active.unwrap_or(true),
            sort_order: req.sort_order,
            pricing: req.pricing.into(),
            scope: req.scope.into(),
        }
    }
}

impl From<PlanPricingDto> for PlanPricing {
    fn from(dto: PlanPricingDto) -> Self {
        match dto {
            PlanPricingDto::Fixed { price } => PlanPricing::Fixed { price },
            PlanPricingDto::Percentage {
                percentage,
                min_price,
                max_price,
            } => PlanPricing::Percentage {
                percentage,
                min_price,
                max_price,
            },
        }
    }
}

impl From<PlanPricing> for PlanPricingDto {
    fn from(pricing: PlanPricing) -> Self {
        match pricing {
            PlanPricing::Fixed { price } => PlanPricingDto::Fixed { price },
            PlanPricing::Percentage {
                percentage,
                min_price,
                max_price,
            } => PlanPricingDto::Percentage {
                percentage,
                min_price,
                max_price,
            },
        }
    }
}

impl From<PlanScopeDto> for PlanScope {
    fn from(dto: PlanScopeDto) -> Self {
        match dto {
            PlanScopeDto::All => PlanScope::All,
            PlanScopeDto::Categories { levels } => PlanScope::Categories { levels },
            PlanScopeDto::Products { product_ids } => PlanScope::Products { product_ids },
        }
    }
}

impl From<PlanScope> for PlanScopeDto {
    fn from(scope: PlanScope) -> Self {
        match scope {
            PlanScope::All => PlanScopeDto::All,
            PlanScope::Categories { levels } => PlanScopeDto::Categories { levels },
            PlanScope::Products { product_ids } => PlanScopeDto::Products { product_ids },
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub brand_id: Option<BrandId>,
    pub price: Decimal,
    pub offer_price: Decimal,
    pub effective_price: Decimal,
    pub category_ids: CategoryPath,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            effective_price: p.effective_price(),
            id: p.id,
            name: p.name,
            sku: p.sku,
            brand_id: p.brand_id,
            price: p.price,
            offer_price: p.offer_price,
            category_ids: p.categories,
            version: p.version,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResponse {
    pub products_updated: u32,
    pub adjustment_id: AdjustmentId,
}

impl From<AdjustmentOutcome> for BulkUpdateResponse {
    fn from(outcome: AdjustmentOutcome) -> Self {
        Self {
            products_updated: outcome.products_updated,
            adjustment_id: outcome.adjustment_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentLineResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub previous_price: Decimal,
    pub previous_offer_price: Decimal,
    pub new_price: Decimal,
    pub new_offer_price: Decimal,
    pub price_change: Decimal,
    pub price_change_percentage: Decimal,
    pub offer_price_change: Decimal,
    pub offer_price_change_percentage: Decimal,
}

impl From<PriceAdjustmentLine> for AdjustmentLineResponse {
    fn from(line: PriceAdjustmentLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            sku: line.sku,
            previous_price: line.previous_price,
            previous_offer_price: line.previous_offer_price,
            new_price: line.new_price,
            new_offer_price: line.new_offer_price,
            price_change: line.price_change,
            price_change_percentage: line.price_change_percentage,
            offer_price_change: line.offer_price_change,
            offer_price_change_percentage: line.offer_price_change_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecordResponse {
    pub id: AdjustmentId,
    pub adjustment_type: AdjustmentType,
    pub adjustment_method: AdjustmentMethod,
    pub adjustment_value: Decimal,
    pub notes: Option<String>,
    pub filter_criteria: FilterCriteria,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
    pub total_products_affected: u32,
    pub items: Vec<AdjustmentLineResponse>,
}

impl From<PriceAdjustmentRecord> for AdjustmentRecordResponse {
    fn from(r: PriceAdjustmentRecord) -> Self {
        Self {
            id: r.id,
            adjustment_type: r.adjustment_type,
            adjustment_method: r.adjustment_method,
            adjustment_value: r.adjustment_value,
            notes: r.notes,
            filter_criteria: r.filter_criteria,
            performed_by: r.performed_by,
            created_at: r.created_at,
            total_products_affected: r.total_products_affected,
            items: r.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

impl<T> PageResponse<T> {
    pub fn from_page<U: Into<T>>(page: Page<U>) -> Self {
        Self {
            total: page.total,
            limit: page.pagination.limit,
            offset: page.pagination.offset,
            has_more: page.has_more,
            items: page.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: PlanId,
    pub name: String,
    pub protection_type: ProtectionType,
    pub duration: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub pricing: PlanPricingDto,
    pub scope: PlanScopeDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProtectionPlan> for PlanResponse {
    fn from(p: ProtectionPlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            protection_type: p.protection_type,
            duration: p.duration,
            description: p.description,
            is_active: p.is_active,
            sort_order: p.sort_order,
            pricing: p.pricing.into(),
            scope: p.scope.into(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// A plan offered for a product, with its price for that product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicablePlanResponse {
    #[serde(flatten)]
    pub plan: PlanResponse,
    pub calculated_price: Decimal,
}

impl From<ApplicablePlan> for ApplicablePlanResponse {
    fn from(a: ApplicablePlan) -> Self {
        Self {
            plan: a.plan.into(),
            calculated_price: a.calculated_price,
        }
    }
}

// -------------------------
// Helpers
// -------------------------

pub fn parse_optional_id<T: std::str::FromStr>(
    raw: Option<&str>,
    field: &str,
) -> DomainResult<Option<T>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|_| DomainError::invalid_id(format!("invalid {field} '{s}'")))
        })
        .transpose()
}
