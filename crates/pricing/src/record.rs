use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{AdjustmentId, DomainError, DomainResult, Entity, Pagination, UserId};

use crate::adjustment::{AdjustmentMethod, AdjustmentRule, AdjustmentType, PriceAdjustmentLine};

/// Selection filters the caller used to pick the products.
///
/// Stored verbatim for audit; never re-validated against the product ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
}

/// Immutable audit entry for one bulk price update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAdjustmentRecord {
    pub id: AdjustmentId,
    pub adjustment_type: AdjustmentType,
    pub adjustment_method: AdjustmentMethod,
    pub adjustment_value: Decimal,
    pub notes: Option<String>,
    pub filter_criteria: FilterCriteria,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
    pub total_products_affected: u32,
    pub items: Vec<PriceAdjustmentLine>,
}

impl Entity for PriceAdjustmentRecord {
    type Id = AdjustmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl PriceAdjustmentRecord {
    pub fn new(
        rule: AdjustmentRule,
        notes: Option<String>,
        filter_criteria: FilterCriteria,
        performed_by: UserId,
        items: Vec<PriceAdjustmentLine>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self {
            id: AdjustmentId::new(),
            adjustment_type: rule.adjustment_type,
            adjustment_method: rule.method,
            adjustment_value: rule.value,
            notes,
            filter_criteria,
            performed_by,
            created_at,
            total_products_affected: u32::try_from(items.len()).unwrap_or(u32::MAX),
            items,
        }
    }

    pub fn rule(&self) -> AdjustmentRule {
        AdjustmentRule {
            adjustment_type: self.adjustment_type,
            method: self.adjustment_method,
            value: self.adjustment_value,
        }
    }
}

/// Filters for the adjustment history report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryQuery {
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub performed_by: Option<UserId>,
    pub pagination: Pagination,
}

impl HistoryQuery {
    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::validation("'from' must not be after 'to'"));
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &PriceAdjustmentRecord) -> bool {
        self.from.is_none_or(|from| record.created_at >= from)
            && self.to.is_none_or(|to| record.created_at <= to)
            && self.performed_by.is_none_or(|user| record.performed_by == user)
    }
}
