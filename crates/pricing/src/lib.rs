//! Bulk price adjustment engine.
//!
//! Pure computation only: given products and an adjustment rule, produce the
//! new prices, the per-product partial updates and the immutable audit record.
//! Loading products and committing the batch is the caller's job.

pub mod adjustment;
pub mod batch;
pub mod record;

pub use adjustment::{
    AdjustedProduct, AdjustmentMethod, AdjustmentRule, AdjustmentType, PriceAdjustmentLine,
    ProductPriceUpdate,
};
pub use batch::{AdjustmentBatch, BulkAdjustment, plan_batch, preview_lines, unique_product_ids};
pub use record::{FilterCriteria, HistoryQuery, PriceAdjustmentRecord};
