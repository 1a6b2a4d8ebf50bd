//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `RepositoryError` |
//! |------------|---------------|-------------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (check violation) | `23514` | `Persistence` |
//! | Database (other) / pool / io | any | `Persistence` |
//!
//! Version mismatches are detected by guarded `UPDATE ... WHERE version = $n`
//! statements and surface as `Conflict`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use shopfront_catalog::{PricePatch, Product, ProductFilter};
use shopfront_core::{
    AdjustmentId, BrandId, ExpectedVersion, Page, PlanId, ProductId, UserId,
};
use shopfront_pricing::{AdjustmentBatch, HistoryQuery, PriceAdjustmentRecord, ProductPriceUpdate};
use shopfront_protection::ProtectionPlan;

use super::{
    AdjustmentHistoryRepository, ProductRepository, ProtectionPlanRepository, RepoResult,
    RepositoryError,
};

const PRODUCT_COLUMNS: &str = "id, name, sku, brand_id, price, offer_price, categories, version, created_at, updated_at";

const PLAN_COLUMNS: &str = "id, name, protection_type, duration, description, is_active, sort_order, pricing, scope, created_at, updated_at";

const ADJUSTMENT_COLUMNS: &str = "id, adjustment_type, adjustment_method, adjustment_value, notes, filter_criteria, performed_by, created_at, total_products_affected, items";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Persistence(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, brand_id, price, offer_price, categories, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.brand_id.map(Uuid::from))
        .bind(product.price)
        .bind(product.offer_price)
        .bind(to_json("categories", &product.categories)?)
        .bind(version_to_db(product.version)?)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(
        skip(self, ids),
        fields(requested = ids.len(), found = tracing::field::Empty),
        err
    )]
    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_products", e))?;

        let loaded = rows
            .iter()
            .map(product_from_row)
            .collect::<RepoResult<Vec<_>>>()?;

        let ordered = in_request_order(ids, loaded);
        Span::current().record("found", ordered.len());
        Ok(ordered)
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        // Brand and parent category narrow in SQL; the rest of the filter runs in Rust.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::UUID IS NULL OR brand_id = $1)
              AND ($2::TEXT IS NULL OR categories->>0 = $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(filter.brand_id.map(Uuid::from))
        .bind(filter.category_id.map(|c| c.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let mut products = Vec::with_capacity(rows.len());
        for row in &rows {
            let product = product_from_row(row)?;
            if filter.matches(&product) {
                products.push(product);
            }
        }
        Ok(products)
    }

    #[instrument(skip(self, patch), fields(product_id = %id, expected = ?expected), err)]
    async fn update_prices(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
        patch: &PricePatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Product> {
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(version_to_db(v)?),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET price = COALESCE($2, price),
                offer_price = COALESCE($3, offer_price),
                version = version + 1,
                updated_at = $4
            WHERE id = $1 AND ($5::BIGINT IS NULL OR version = $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(patch.price)
        .bind(patch.offer_price)
        .bind(now)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_prices", e))?;

        match row {
            Some(row) => product_from_row(&row),
            None => match self.get_product(id).await? {
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "product {id}: expected {expected:?}, found version {}",
                    current.version
                ))),
                None => Err(RepositoryError::NotFound(format!("product {id}"))),
            },
        }
    }
}

#[async_trait]
impl ProtectionPlanRepository for PostgresStore {
    #[instrument(skip(self, plan), fields(plan_id = %plan.id), err)]
    async fn insert_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO protection_plans
                (id, name, protection_type, duration, description, is_active, sort_order, pricing, scope, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(enum_text("protection_type", &plan.protection_type)?)
        .bind(&plan.duration)
        .bind(&plan.description)
        .bind(plan.is_active)
        .bind(plan.sort_order)
        .bind(to_json("pricing", &plan.pricing)?)
        .bind(to_json("scope", &plan.scope)?)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_plan", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(plan_id = %id), err)]
    async fn get_plan(&self, id: PlanId) -> RepoResult<Option<ProtectionPlan>> {
        let row = sqlx::query(&format!("SELECT {PLAN_COLUMNS} FROM protection_plans WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_plan", e))?;
        row.as_ref().map(plan_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {PLAN_COLUMNS} FROM protection_plans ORDER BY sort_order ASC, created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_plans", e))?;
        rows.iter().map(plan_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_active_plans(&self) -> RepoResult<Vec<ProtectionPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {PLAN_COLUMNS} FROM protection_plans WHERE is_active ORDER BY sort_order ASC, created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active_plans", e))?;
        rows.iter().map(plan_from_row).collect()
    }

    #[instrument(skip(self, plan), fields(plan_id = %plan.id), err)]
    async fn update_plan(&self, plan: &ProtectionPlan) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE protection_plans
            SET name = $2, protection_type = $3, duration = $4, description = $5,
                is_active = $6, sort_order = $7, pricing = $8, scope = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(enum_text("protection_type", &plan.protection_type)?)
        .bind(&plan.duration)
        .bind(&plan.description)
        .bind(plan.is_active)
        .bind(plan.sort_order)
        .bind(to_json("pricing", &plan.pricing)?)
        .bind(to_json("scope", &plan.scope)?)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_plan", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("protection plan {}", plan.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(plan_id = %id), err)]
    async fn delete_plan(&self, id: PlanId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM protection_plans WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_plan", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("protection plan {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AdjustmentHistoryRepository for PostgresStore {
    /// One transaction: every guarded product update, then the audit row.
    #[instrument(
        skip(self, batch),
        fields(adjustment_id = %batch.record.id, updates = batch.updates.len()),
        err
    )]
    async fn commit_adjustment(&self, batch: &AdjustmentBatch) -> RepoResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for update in &batch.updates {
            if !apply_guarded_update(&mut tx, update, batch.record.created_at).await? {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(RepositoryError::Conflict(format!(
                    "product {} changed since version {}",
                    update.product_id, update.expected_version
                )));
            }
        }

        let record = &batch.record;
        sqlx::query(
            r#"
            INSERT INTO price_adjustments
                (id, adjustment_type, adjustment_method, adjustment_value, notes, filter_criteria,
                 performed_by, created_at, total_products_affected, items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.adjustment_type.as_str())
        .bind(record.adjustment_method.as_str())
        .bind(record.adjustment_value)
        .bind(&record.notes)
        .bind(to_json("filter_criteria", &record.filter_criteria)?)
        .bind(record.performed_by.as_uuid())
        .bind(record.created_at)
        .bind(i64::from(record.total_products_affected))
        .bind(to_json("items", &record.items)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_adjustment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(adjustment_id = %id), err)]
    async fn get_adjustment(&self, id: AdjustmentId) -> RepoResult<Option<PriceAdjustmentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ADJUSTMENT_COLUMNS} FROM price_adjustments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_adjustment", e))?;
        row.as_ref().map(adjustment_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn query_adjustments(&self, query: &HistoryQuery) -> RepoResult<Page<PriceAdjustmentRecord>> {
        let performed_by = query.performed_by.map(Uuid::from);

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM price_adjustments
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
              AND ($3::UUID IS NULL OR performed_by = $3)
            "#,
        )
        .bind(query.from)
        .bind(query.to)
        .bind(performed_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_adjustments", e))?
        .try_get("total")
        .map_err(|e| map_sqlx_error("count_adjustments", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ADJUSTMENT_COLUMNS}
            FROM price_adjustments
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
              AND ($3::UUID IS NULL OR performed_by = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(performed_by)
        .bind(i64::from(query.pagination.limit))
        .bind(i64::from(query.pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_adjustments", e))?;

        let items = rows
            .iter()
            .map(adjustment_from_row)
            .collect::<RepoResult<Vec<_>>>()?;
        let total = u64::try_from(total).unwrap_or_default();
        Ok(Page::new(items, total, query.pagination))
    }
}

/// Returns `false` when the product is missing or its version moved on.
async fn apply_guarded_update(
    tx: &mut Transaction<'_, Postgres>,
    update: &ProductPriceUpdate,
    now: DateTime<Utc>,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET price = COALESCE($2, price),
            offer_price = COALESCE($3, offer_price),
            version = version + 1,
            updated_at = $4
        WHERE id = $1 AND version = $5
        "#,
    )
    .bind(update.product_id.as_uuid())
    .bind(update.patch.price)
    .bind(update.patch.offer_price)
    .bind(now)
    .bind(version_to_db(update.expected_version)?)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("apply_guarded_update", e))?;
    Ok(result.rows_affected() == 1)
}

fn product_from_row(row: &PgRow) -> RepoResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        sku: column(row, "sku")?,
        brand_id: column::<Option<Uuid>>(row, "brand_id")?.map(BrandId::from_uuid),
        price: column::<Decimal>(row, "price")?,
        offer_price: column::<Decimal>(row, "offer_price")?,
        categories: from_json("categories", column(row, "categories")?)?,
        version: version_from_db(column(row, "version")?)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn plan_from_row(row: &PgRow) -> RepoResult<ProtectionPlan> {
    Ok(ProtectionPlan {
        id: PlanId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        protection_type: from_json(
            "protection_type",
            serde_json::Value::String(column(row, "protection_type")?),
        )?,
        duration: column(row, "duration")?,
        description: column(row, "description")?,
        is_active: column(row, "is_active")?,
        sort_order: column(row, "sort_order")?,
        pricing: from_json("pricing", column(row, "pricing")?)?,
        scope: from_json("scope", column(row, "scope")?)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn adjustment_from_row(row: &PgRow) -> RepoResult<PriceAdjustmentRecord> {
    let total: i64 = column(row, "total_products_affected")?;
    Ok(PriceAdjustmentRecord {
        id: AdjustmentId::from_uuid(column(row, "id")?),
        adjustment_type: from_json(
            "adjustment_type",
            serde_json::Value::String(column(row, "adjustment_type")?),
        )?,
        adjustment_method: from_json(
            "adjustment_method",
            serde_json::Value::String(column(row, "adjustment_method")?),
        )?,
        adjustment_value: column(row, "adjustment_value")?,
        notes: column(row, "notes")?,
        filter_criteria: from_json("filter_criteria", column(row, "filter_criteria")?)?,
        performed_by: UserId::from_uuid(column(row, "performed_by")?),
        created_at: column(row, "created_at")?,
        total_products_affected: u32::try_from(total).map_err(|_| {
            RepositoryError::Persistence(format!("total_products_affected out of range: {total}"))
        })?,
        items: from_json("items", column(row, "items")?)?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> RepoResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Persistence(format!("failed to read column {name}: {e}")))
}

/// Reorder `loaded` to follow `ids`; ids without a row are skipped.
fn in_request_order(ids: &[ProductId], loaded: Vec<Product>) -> Vec<Product> {
    let mut by_id: HashMap<ProductId, Product> = loaded.into_iter().map(|p| (p.id, p)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

fn to_json<T: Serialize>(what: &str, value: &T) -> RepoResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::Persistence(format!("failed to encode {what}: {e}")))
}

fn from_json<T: DeserializeOwned>(what: &str, value: serde_json::Value) -> RepoResult<T> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::Persistence(format!("failed to decode {what}: {e}")))
}

/// Text form of a unit enum, as serde names it.
fn enum_text<T: Serialize>(what: &str, value: &T) -> RepoResult<String> {
    match to_json(what, value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(RepositoryError::Persistence(format!(
            "{what} did not encode as text: {other}"
        ))),
    }
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::Persistence(format!("version out of range: {version}")))
}

fn version_from_db(version: i64) -> RepoResult<u64> {
    u64::try_from(version)
        .map_err(|_| RepositoryError::Persistence(format!("negative version in database: {version}")))
}

/// Map SQLx errors to `RepositoryError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Duplicate(msg),
                _ => RepositoryError::Persistence(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Persistence(format!("connection pool closed in {operation}"))
        }
        _ => RepositoryError::Persistence(format!("sqlx error in {operation}: {err}")),
    }
}
