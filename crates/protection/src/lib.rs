//! Buyer-protection plans and the eligibility resolver.
//!
//! Decides which active plans apply to a product (everything, an explicit
//! product list, or a category-hierarchy match) and what each plan costs for
//! the product's price. Pure domain logic; plans and products are loaded by
//! the caller.

pub mod eligibility;
pub mod plan;

pub use eligibility::{ApplicablePlan, resolve_applicable_plans};
pub use plan::{CategoryScope, NewProtectionPlan, PlanPricing, PlanScope, ProtectionPlan, ProtectionType};
