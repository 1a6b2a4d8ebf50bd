use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{CategoryId, DomainError, DomainResult, Entity, PlanId, ProductId};

/// Kind of cover a plan provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionType {
    Warranty,
    DamageProtection,
    AccidentalExtended,
}

/// How a plan is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlanPricing {
    /// Flat price regardless of the product price.
    Fixed { price: Decimal },
    /// A share of the product price, optionally clamped.
    Percentage {
        percentage: Decimal,
        #[serde(default)]
        min_price: Option<Decimal>,
        #[serde(default)]
        max_price: Option<Decimal>,
    },
}

impl PlanPricing {
    pub fn validate(&self) -> DomainResult<()> {
        match *self {
            PlanPricing::Fixed { price } => {
                if price <= Decimal::ZERO {
                    return Err(DomainError::validation("fixed price must be greater than zero"));
                }
            }
            PlanPricing::Percentage {
                percentage,
                min_price,
                max_price,
            } => {
                if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
                    return Err(DomainError::validation("percentage must be between 0 and 100"));
                }
                if min_price.is_some_and(|p| p < Decimal::ZERO)
                    || max_price.is_some_and(|p| p < Decimal::ZERO)
                {
                    return Err(DomainError::validation("price clamps cannot be negative"));
                }
                if let (Some(min), Some(max)) = (min_price, max_price) {
                    if min > max {
                        return Err(DomainError::validation(
                            "minimum price must not exceed maximum price",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Category sets indexed by depth (0 = parent category).
///
/// An empty set at a depth means that depth is not constrained.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryScope(Vec<BTreeSet<CategoryId>>);

impl CategoryScope {
    pub fn new(levels: Vec<BTreeSet<CategoryId>>) -> Self {
        Self(levels)
    }

    /// Scope constrained only at the parent-category level.
    pub fn parents(ids: impl IntoIterator<Item = CategoryId>) -> Self {
        Self(vec![ids.into_iter().collect()])
    }

    pub fn levels(&self) -> &[BTreeSet<CategoryId>] {
        &self.0
    }

    /// True when no depth has any category selected.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(BTreeSet::is_empty)
    }
}

/// Which products a plan is offered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "applies_to", rename_all = "snake_case")]
pub enum PlanScope {
    All,
    Categories { levels: CategoryScope },
    Products { product_ids: BTreeSet<ProductId> },
}

/// Buyer-protection plan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionPlan {
    pub id: PlanId,
    pub name: String,
    pub protection_type: ProtectionType,
    /// Human-readable duration, e.g. "1 year".
    pub duration: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub pricing: PlanPricing,
    pub scope: PlanScope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for ProtectionPlan {
    type Id = PlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ProtectionPlan {
    pub fn create(new: NewProtectionPlan, now: DateTime<Utc>) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id: PlanId::new(),
            name: new.name.trim().to_string(),
            protection_type: new.protection_type,
            duration: new.duration.trim().to_string(),
            description: new.description,
            is_active: new.is_active,
            sort_order: new.sort_order,
            pricing: new.pricing,
            scope: new.scope,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the configuration, keeping identity and creation time.
    pub fn replace(&mut self, new: NewProtectionPlan, now: DateTime<Utc>) -> DomainResult<()> {
        new.validate()?;
        self.name = new.name.trim().to_string();
        self.protection_type = new.protection_type;
        self.duration = new.duration.trim().to_string();
        self.description = new.description;
        self.is_active = new.is_active;
        self.sort_order = new.sort_order;
        self.pricing = new.pricing;
        self.scope = new.scope;
        self.updated_at = now;
        Ok(())
    }
}

fn default_active() -> bool {
    true
}

/// Input for creating or replacing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProtectionPlan {
    pub name: String,
    pub protection_type: ProtectionType,
    pub duration: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub pricing: PlanPricing,
    pub scope: PlanScope,
}

impl NewProtectionPlan {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.duration.trim().is_empty() {
            return Err(DomainError::validation("duration cannot be empty"));
        }
        self.pricing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn new_plan(pricing: PlanPricing) -> NewProtectionPlan {
        NewProtectionPlan {
            name: "Extended Warranty".to_string(),
            protection_type: ProtectionType::Warranty,
            duration: "2 years".to_string(),
            description: None,
            is_active: true,
            sort_order: 0,
            pricing,
            scope: PlanScope::All,
        }
    }

    #[test]
    fn fixed_price_must_be_positive() {
        let plan = new_plan(PlanPricing::Fixed { price: Decimal::ZERO });
        assert!(matches!(plan.validate(), Err(DomainError::Validation(_))));
        assert!(new_plan(PlanPricing::Fixed { price: dec("9.99") }).validate().is_ok());
    }

    #[test]
    fn percentage_must_be_within_bounds() {
        for pct in ["-1", "100.01"] {
            let plan = new_plan(PlanPricing::Percentage {
                percentage: dec(pct),
                min_price: None,
                max_price: None,
            });
            assert!(plan.validate().is_err(), "{pct} should be rejected");
        }
        for pct in ["0", "100"] {
            let plan = new_plan(PlanPricing::Percentage {
                percentage: dec(pct),
                min_price: None,
                max_price: None,
            });
            assert!(plan.validate().is_ok(), "{pct} should be accepted");
        }
    }

    #[test]
    fn inverted_clamps_are_rejected() {
        let plan = new_plan(PlanPricing::Percentage {
            percentage: dec("5"),
            min_price: Some(dec("200")),
            max_price: Some(dec("50")),
        });
        assert!(plan.validate().is_err());
    }

    #[test]
    fn blank_name_or_duration_is_rejected() {
        let mut plan = new_plan(PlanPricing::Fixed { price: dec("10") });
        plan.duration = " ".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn replace_keeps_identity_and_creation_time() {
        let created = Utc::now();
        let mut plan = ProtectionPlan::create(new_plan(PlanPricing::Fixed { price: dec("10") }), created).unwrap();
        let id = plan.id;

        let mut update = new_plan(PlanPricing::Fixed { price: dec("12") });
        update.is_active = false;
        plan.replace(update, created + chrono::Duration::minutes(5)).unwrap();

        assert_eq!(plan.id, id);
        assert_eq!(plan.created_at, created);
        assert!(!plan.is_active);
        assert_eq!(plan.pricing, PlanPricing::Fixed { price: dec("12") });
    }

    #[test]
    fn pricing_and_scope_are_tagged_on_the_wire() {
        let json = serde_json::json!({
            "name": "Screen cover",
            "protection_type": "damage_protection",
            "duration": "1 year",
            "pricing": { "mode": "percentage", "percentage": 5, "min_price": 50 },
            "scope": { "applies_to": "categories", "levels": [[], []] }
        });
        let plan: NewProtectionPlan = serde_json::from_value(json).unwrap();
        assert!(plan.is_active);
        assert_eq!(
            plan.pricing,
            PlanPricing::Percentage {
                percentage: dec("5"),
                min_price: Some(dec("50")),
                max_price: None,
            }
        );
        match plan.scope {
            PlanScope::Categories { levels } => assert!(levels.is_empty()),
            other => panic!("expected categories scope, got {other:?}"),
        }
    }
}
