//! Catalog domain module.
//!
//! Products with their base/offer prices and their placement in the category
//! hierarchy, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod product;

pub use product::{CATEGORY_DEPTH, CategoryPath, NewProduct, PricePatch, Product, ProductFilter};
