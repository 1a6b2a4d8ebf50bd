use chrono::Utc;
use tracing::instrument;

use shopfront_catalog::{NewProduct, PricePatch, Product, ProductFilter};
use shopfront_core::{ExpectedVersion, ProductId};

use super::{ServiceError, ServiceResult};
use crate::repository::ProductRepository;

/// Product management used by the admin screens.
#[derive(Debug, Clone)]
pub struct CatalogService<R> {
    products: R,
}

impl<R: ProductRepository> CatalogService<R> {
    pub fn new(products: R) -> Self {
        Self { products }
    }

    #[instrument(skip(self, new), fields(sku = %new.sku), err)]
    pub async fn create_product(&self, new: NewProduct) -> ServiceResult<Product> {
        let product = Product::create(new, Utc::now())?;
        self.products.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.products
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id} not found")))
    }

    #[instrument(skip(self), err)]
    pub async fn list_products(&self, filter: &ProductFilter) -> ServiceResult<Vec<Product>> {
        Ok(self.products.list_products(filter).await?)
    }

    /// Manual price edit for a single product.
    #[instrument(skip(self), err)]
    pub async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: PricePatch,
    ) -> ServiceResult<Product> {
        patch.validate()?;
        let product = self
            .products
            .update_prices(id, expected, &patch, Utc::now())
            .await?;
        tracing::info!(product_id = %id, version = product.version, "product prices updated");
        Ok(product)
    }
}
