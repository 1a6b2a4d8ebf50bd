//! Planning a bulk adjustment: validate the request, compute every product,
//! and assemble the writes plus the audit record that must commit together.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use shopfront_catalog::Product;
use shopfront_core::{DomainError, DomainResult, ProductId, UserId};

use crate::adjustment::{AdjustmentRule, PriceAdjustmentLine, ProductPriceUpdate};
use crate::record::{FilterCriteria, PriceAdjustmentRecord};

/// A bulk price update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAdjustment {
    pub product_ids: Vec<ProductId>,
    pub rule: AdjustmentRule,
    pub notes: Option<String>,
    pub filter_criteria: FilterCriteria,
    pub performed_by: UserId,
}

impl BulkAdjustment {
    pub fn validate(&self) -> DomainResult<()> {
        if self.product_ids.is_empty() {
            return Err(DomainError::validation("no products selected"));
        }
        self.rule.validate()
    }

    pub fn unique_product_ids(&self) -> Vec<ProductId> {
        unique_product_ids(&self.product_ids)
    }
}

/// `ids` with duplicates removed, first occurrence wins.
pub fn unique_product_ids(ids: &[ProductId]) -> Vec<ProductId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Everything that must be persisted atomically for one bulk adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentBatch {
    /// Partial product writes; products whose prices do not change are omitted.
    pub updates: Vec<ProductPriceUpdate>,
    pub record: PriceAdjustmentRecord,
}

/// Compute the batch for the products that resolved from the request.
///
/// Fails with `NotFound` when no product resolved; nothing should be written then.
pub fn plan_batch(
    request: &BulkAdjustment,
    products: &[Product],
    now: DateTime<Utc>,
) -> DomainResult<AdjustmentBatch> {
    request.validate()?;
    if products.is_empty() {
        return Err(DomainError::not_found("products"));
    }

    let mut updates = Vec::with_capacity(products.len());
    let mut items = Vec::with_capacity(products.len());
    for product in products {
        let adjusted = request.rule.apply(product)?;
        if !adjusted.update.patch.is_empty() {
            updates.push(adjusted.update);
        }
        items.push(adjusted.line);
    }

    let record = PriceAdjustmentRecord::new(
        request.rule,
        request.notes.clone(),
        request.filter_criteria.clone(),
        request.performed_by,
        items,
        now,
    );

    Ok(AdjustmentBatch { updates, record })
}

/// Dry run: the audit lines a bulk adjustment would produce.
pub fn preview_lines(
    rule: &AdjustmentRule,
    products: &[Product],
) -> DomainResult<Vec<PriceAdjustmentLine>> {
    rule.validate()?;
    products
        .iter()
        .map(|product| rule.apply(product).map(|adjusted| adjusted.line))
        .collect()
}
