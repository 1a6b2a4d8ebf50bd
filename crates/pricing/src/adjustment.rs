use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_catalog::{PricePatch, Product};
use shopfront_core::{DomainError, DomainResult, ProductId, percentage_change, round2};

/// Which price fields an adjustment touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Both,
    BaseOnly,
    OfferOnly,
}

impl AdjustmentType {
    pub fn adjusts_base(self) -> bool {
        matches!(self, AdjustmentType::Both | AdjustmentType::BaseOnly)
    }

    pub fn adjusts_offer(self) -> bool {
        matches!(self, AdjustmentType::Both | AdjustmentType::OfferOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentType::Both => "both",
            AdjustmentType::BaseOnly => "base_only",
            AdjustmentType::OfferOnly => "offer_only",
        }
    }
}

/// How the adjustment value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMethod {
    /// Signed percentage points (`10` = +10%).
    Percentage,
    /// Signed currency units added to the price, floored at zero.
    FixedAmount,
}

impl AdjustmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentMethod::Percentage => "percentage",
            AdjustmentMethod::FixedAmount => "fixed_amount",
        }
    }
}

/// A bulk price adjustment rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRule {
    pub adjustment_type: AdjustmentType,
    pub method: AdjustmentMethod,
    pub value: Decimal,
}

/// Audit snapshot of one product's prices before and after an adjustment.
///
/// Amounts serialize as decimal strings so the stored audit trail keeps every digit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAdjustmentLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub previous_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub previous_offer_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub new_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub new_offer_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_change_percentage: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub offer_price_change: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub offer_price_change_percentage: Decimal,
}

/// Partial write for one product, guarded by the version it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPriceUpdate {
    pub product_id: ProductId,
    pub expected_version: u64,
    pub patch: PricePatch,
}

/// Result of applying a rule to a single product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustedProduct {
    pub line: PriceAdjustmentLine,
    pub update: ProductPriceUpdate,
}

impl AdjustmentRule {
    /// Rejects percentage cuts deeper than -100%, which would turn prices negative.
    pub fn validate(&self) -> DomainResult<()> {
        if self.method == AdjustmentMethod::Percentage && self.value < -Decimal::ONE_HUNDRED {
            return Err(DomainError::validation(
                "percentage adjustment cannot be lower than -100",
            ));
        }
        Ok(())
    }

    /// Compute new prices for `product`. Does not mutate the product.
    ///
    /// An offer price of zero means "no offer" and is never adjusted.
    pub fn apply(&self, product: &Product) -> DomainResult<AdjustedProduct> {
        let previous_price = product.price;
        let previous_offer_price = product.offer_price;

        let mut patch = PricePatch::default();
        if self.adjustment_type.adjusts_base() {
            patch.price = Some(self.adjust(previous_price)?);
        }
        if self.adjustment_type.adjusts_offer() && previous_offer_price > Decimal::ZERO {
            patch.offer_price = Some(self.adjust(previous_offer_price)?);
        }

        let new_price = patch.price.unwrap_or(previous_price);
        let new_offer_price = patch.offer_price.unwrap_or(previous_offer_price);

        let line = PriceAdjustmentLine {
            product_id: product.id,
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            previous_price: round2(previous_price),
            previous_offer_price: round2(previous_offer_price),
            new_price: round2(new_price),
            new_offer_price: round2(new_offer_price),
            price_change: round2(new_price - previous_price),
            price_change_percentage: change_percentage(previous_price, new_price)?,
            offer_price_change: round2(new_offer_price - previous_offer_price),
            offer_price_change_percentage: change_percentage(previous_offer_price, new_offer_price)?,
        };

        Ok(AdjustedProduct {
            line,
            update: ProductPriceUpdate {
                product_id: product.id,
                expected_version: product.version,
                patch,
            },
        })
    }

    fn adjust(&self, previous: Decimal) -> DomainResult<Decimal> {
        let adjusted = match self.method {
            AdjustmentMethod::Percentage => {
                let multiplier = Decimal::ONE
                    .checked_add(self.value / Decimal::ONE_HUNDRED)
                    .ok_or_else(out_of_range)?;
                previous.checked_mul(multiplier).ok_or_else(out_of_range)?
            }
            AdjustmentMethod::FixedAmount => previous
                .checked_add(self.value)
                .ok_or_else(out_of_range)?
                .max(Decimal::ZERO),
        };
        Ok(round2(adjusted))
    }
}

fn change_percentage(previous: Decimal, new: Decimal) -> DomainResult<Decimal> {
    percentage_change(previous, new).ok_or_else(out_of_range)
}

fn out_of_range() -> DomainError {
    DomainError::validation("adjustment value pushes prices out of the representable range")
}
