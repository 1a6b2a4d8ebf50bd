use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{BrandId, CategoryId, DomainError, DomainResult, Entity, ProductId};

/// Number of category levels a product can be placed under
/// (parent category plus four nested subcategory levels).
pub const CATEGORY_DEPTH: usize = 5;

/// Placement of a product in the category hierarchy, indexed by depth.
///
/// Index 0 is the parent category; 1..=4 are the subcategory levels. Each
/// level is optional and gaps are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<Option<CategoryId>>);

impl CategoryPath {
    pub fn new(levels: Vec<Option<CategoryId>>) -> DomainResult<Self> {
        if levels.len() > CATEGORY_DEPTH {
            return Err(DomainError::validation(format!(
                "category path has {} levels (max {CATEGORY_DEPTH})",
                levels.len()
            )));
        }
        let mut levels = levels;
        while matches!(levels.last(), Some(None)) {
            levels.pop();
        }
        Ok(Self(levels))
    }

    /// A path with only the parent category set.
    pub fn with_parent(parent: CategoryId) -> Self {
        Self(vec![Some(parent)])
    }

    /// Category id at `depth` (0 = parent), if the product is placed there.
    pub fn at(&self, depth: usize) -> Option<CategoryId> {
        self.0.get(depth).copied().flatten()
    }

    pub fn parent(&self) -> Option<CategoryId> {
        self.at(0)
    }

    pub fn levels(&self) -> &[Option<CategoryId>] {
        &self.0
    }

    fn has_subcategory(&self, id: CategoryId) -> bool {
        self.0.iter().skip(1).any(|level| *level == Some(id))
    }
}

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub brand_id: Option<BrandId>,
    /// Base price in currency units.
    pub price: Decimal,
    /// Sale price; zero means the product has no offer.
    pub offer_price: Decimal,
    pub categories: CategoryPath,
    /// Incremented on every write (optimistic concurrency).
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Product {
    pub fn create(new: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id: ProductId::new(),
            name: new.name.trim().to_string(),
            sku: new.sku.trim().to_string(),
            brand_id: new.brand_id,
            price: new.price,
            offer_price: new.offer_price.unwrap_or(Decimal::ZERO),
            categories: new.categories,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_offer(&self) -> bool {
        self.offer_price > Decimal::ZERO
    }

    /// The price a customer pays right now: the offer price when one exists.
    pub fn effective_price(&self) -> Decimal {
        if self.has_offer() {
            self.offer_price
        } else {
            self.price
        }
    }

    /// Apply a partial price update. Untouched fields keep their value.
    pub fn apply_price_patch(&mut self, patch: &PricePatch, now: DateTime<Utc>) {
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(offer_price) = patch.offer_price {
            self.offer_price = offer_price;
        }
        self.version += 1;
        self.updated_at = now;
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub brand_id: Option<BrandId>,
    pub price: Decimal,
    pub offer_price: Option<Decimal>,
    #[serde(default)]
    pub categories: CategoryPath,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if self.price < Decimal::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if self.offer_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::validation("offer price cannot be negative"));
        }
        if self.categories.levels().len() > CATEGORY_DEPTH {
            return Err(DomainError::validation(format!(
                "category path has more than {CATEGORY_DEPTH} levels"
            )));
        }
        Ok(())
    }
}

/// Partial update of a product's price fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricePatch {
    pub price: Option<Decimal>,
    pub offer_price: Option<Decimal>,
}

impl PricePatch {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.offer_price.is_none()
    }

    /// Validation for manual edits; bulk adjustments build patches directly.
    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::validation("no price fields to update"));
        }
        if self.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if self.offer_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::validation("offer price cannot be negative"));
        }
        Ok(())
    }
}

/// Product selection filters used by the admin product list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Parent category (depth 0).
    pub category_id: Option<CategoryId>,
    /// Matches a product placed under this id at any subcategory level.
    pub subcategory_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    /// Case-insensitive substring of the name or SKU.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category_id) = self.category_id {
            if product.categories.parent() != Some(category_id) {
                return false;
            }
        }
        if let Some(subcategory_id) = self.subcategory_id {
            if !product.categories.has_subcategory(subcategory_id) {
                return false;
            }
        }
        if let Some(brand_id) = self.brand_id {
            if product.brand_id != Some(brand_id) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.sku.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn new_product(price: &str, offer: Option<&str>) -> NewProduct {
        NewProduct {
            name: "Espresso Machine".to_string(),
            sku: "ESP-100".to_string(),
            brand_id: None,
            price: dec(price),
            offer_price: offer.map(dec),
            categories: CategoryPath::default(),
        }
    }

    #[test]
    fn create_product_starts_at_version_one_without_offer() {
        let product = Product::create(new_product("1000", None), Utc::now()).unwrap();
        assert_eq!(product.version, 1);
        assert_eq!(product.offer_price, Decimal::ZERO);
        assert!(!product.has_offer());
        assert_eq!(product.effective_price(), dec("1000"));
    }

    #[test]
    fn effective_price_prefers_offer() {
        let product = Product::create(new_product("1000", Some("800")), Utc::now()).unwrap();
        assert_eq!(product.effective_price(), dec("800"));
    }

    #[test]
    fn create_product_rejects_blank_name_and_sku() {
        let mut blank_name = new_product("10", None);
        blank_name.name = "  ".to_string();
        assert!(matches!(
            Product::create(blank_name, Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let mut blank_sku = new_product("10", None);
        blank_sku.sku = String::new();
        assert!(matches!(
            Product::create(blank_sku, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn create_product_rejects_negative_prices() {
        assert!(new_product("-1", None).validate().is_err());
        assert!(new_product("10", Some("-0.01")).validate().is_err());
    }

    #[test]
    fn category_path_rejects_more_than_five_levels() {
        let levels = vec![Some(CategoryId::new()); CATEGORY_DEPTH + 1];
        assert!(CategoryPath::new(levels).is_err());
    }

    #[test]
    fn category_path_trims_trailing_empty_levels() {
        let parent = CategoryId::new();
        let path = CategoryPath::new(vec![Some(parent), None, None]).unwrap();
        assert_eq!(path.levels().len(), 1);
        assert_eq!(path.parent(), Some(parent));
        assert_eq!(path.at(3), None);
    }

    #[test]
    fn price_patch_touches_only_given_fields() {
        let mut product = Product::create(new_product("1000", Some("800")), Utc::now()).unwrap();
        product.apply_price_patch(
            &PricePatch {
                price: Some(dec("1100")),
                offer_price: None,
            },
            Utc::now(),
        );
        assert_eq!(product.price, dec("1100"));
        assert_eq!(product.offer_price, dec("800"));
        assert_eq!(product.version, 2);
    }

    #[test]
    fn empty_price_patch_is_invalid() {
        assert!(PricePatch::default().validate().is_err());
    }

    #[test]
    fn filter_matches_parent_subcategory_brand_and_search() {
        let parent = CategoryId::new();
        let sub = CategoryId::new();
        let brand = BrandId::new();
        let mut input = new_product("10", None);
        input.brand_id = Some(brand);
        input.categories = CategoryPath::new(vec![Some(parent), None, Some(sub)]).unwrap();
        let product = Product::create(input, Utc::now()).unwrap();

        assert!(ProductFilter::default().matches(&product));
        assert!(
            ProductFilter {
                category_id: Some(parent),
                subcategory_id: Some(sub),
                brand_id: Some(brand),
                search: Some("esp".to_string()),
            }
            .matches(&product)
        );
        assert!(
            !ProductFilter {
                category_id: Some(sub),
                ..Default::default()
            }
            .matches(&product)
        );
        assert!(
            !ProductFilter {
                search: Some("kettle".to_string()),
                ..Default::default()
            }
            .matches(&product)
        );
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a patch bumps the version by exactly one and leaves
            /// absent fields untouched.
            #[test]
            fn patch_preserves_absent_fields(
                price in 0i64..10_000_000,
                offer in 0i64..10_000_000,
                new_price in proptest::option::of(0i64..10_000_000),
            ) {
                let mut product = Product::create(
                    NewProduct {
                        name: "Kettle".to_string(),
                        sku: "KT-1".to_string(),
                        brand_id: None,
                        price: Decimal::new(price, 2),
                        offer_price: Some(Decimal::new(offer, 2)),
                        categories: CategoryPath::default(),
                    },
                    Utc::now(),
                ).unwrap();
                let before = product.clone();
                let patch = PricePatch { price: new_price.map(|p| Decimal::new(p, 2)), offer_price: None };
                product.apply_price_patch(&patch, Utc::now());

                prop_assert_eq!(product.offer_price, before.offer_price);
                prop_assert_eq!(product.price, patch.price.unwrap_or(before.price));
                prop_assert_eq!(product.version, before.version + 1);
            }
        }
    }
}
