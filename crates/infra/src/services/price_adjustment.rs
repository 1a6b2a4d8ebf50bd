//! Bulk price adjustments: load, compute, commit atomically, audit.
//!
//! A batch is computed from the product versions it read. If any product
//! moves on before the commit, the store rejects the whole batch and the
//! service re-runs it against fresh data, up to `conflict_retries` times.

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use shopfront_core::{AdjustmentId, Page, ProductId};
use shopfront_pricing::{
    AdjustmentRule, BulkAdjustment, HistoryQuery, PriceAdjustmentLine, PriceAdjustmentRecord,
    plan_batch, preview_lines, unique_product_ids,
};

use super::{DEFAULT_CONFLICT_RETRIES, ServiceError, ServiceResult};
use crate::repository::{AdjustmentHistoryRepository, ProductRepository, RepositoryError};

/// Result of a committed bulk adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustmentOutcome {
    pub products_updated: u32,
    pub adjustment_id: AdjustmentId,
}

#[derive(Debug, Clone)]
pub struct PriceAdjustmentService<S> {
    store: S,
    conflict_retries: u32,
}

impl<S> PriceAdjustmentService<S>
where
    S: ProductRepository + AdjustmentHistoryRepository,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Apply one rule to every resolvable product in the request.
    ///
    /// Unknown ids are skipped. Fails with `NotFound` when none resolve and
    /// with `Conflict` when concurrent edits outlast the retry budget.
    #[instrument(
        skip(self, request),
        fields(
            requested = request.product_ids.len(),
            adjustment_type = request.rule.adjustment_type.as_str(),
            method = request.rule.method.as_str(),
            performed_by = %request.performed_by,
        ),
        err
    )]
    pub async fn apply(&self, request: BulkAdjustment) -> ServiceResult<AdjustmentOutcome> {
        request.validate()?;
        let ids = request.unique_product_ids();

        let mut attempt = 0;
        loop {
            let products = self.store.get_products(&ids).await?;
            let batch = plan_batch(&request, &products, Utc::now())?;

            match self.store.commit_adjustment(&batch).await {
                Ok(()) => {
                    let outcome = AdjustmentOutcome {
                        products_updated: batch.record.total_products_affected,
                        adjustment_id: batch.record.id,
                    };
                    tracing::info!(
                        adjustment_id = %outcome.adjustment_id,
                        products_updated = outcome.products_updated,
                        attempt,
                        "bulk price adjustment committed"
                    );
                    return Ok(outcome);
                }
                Err(RepositoryError::Conflict(msg)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, reason = %msg, "bulk adjustment conflicted; retrying");
                }
                Err(RepositoryError::Conflict(msg)) => {
                    tracing::warn!(attempts = attempt + 1, reason = %msg, "bulk adjustment abandoned");
                    return Err(ServiceError::Conflict(format!(
                        "products changed concurrently; retry the adjustment ({msg})"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Dry run of [`Self::apply`]: the lines that would be recorded.
    #[instrument(skip(self, product_ids), fields(requested = product_ids.len()), err)]
    pub async fn preview(
        &self,
        product_ids: &[ProductId],
        rule: AdjustmentRule,
    ) -> ServiceResult<Vec<PriceAdjustmentLine>> {
        if product_ids.is_empty() {
            return Err(ServiceError::Validation("no products selected".to_string()));
        }
        rule.validate()?;
        let ids = unique_product_ids(product_ids);

        let products = self.store.get_products(&ids).await?;
        if products.is_empty() {
            return Err(ServiceError::NotFound("products not found".to_string()));
        }
        Ok(preview_lines(&rule, &products)?)
    }

    #[instrument(skip(self), err)]
    pub async fn history(&self, query: HistoryQuery) -> ServiceResult<Page<PriceAdjustmentRecord>> {
        query.validate()?;
        Ok(self.store.query_adjustments(&query).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn get(&self, id: AdjustmentId) -> ServiceResult<PriceAdjustmentRecord> {
        self.store
            .get_adjustment(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("price adjustment {id} not found")))
    }
}
