//! # Product Repository
//!
//! Catalog reads for pricing and allocation.
//!
//! Products belong to the catalog component; the core only reads them.
//! `insert` exists for the seed binary and tests.

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use keystone_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, barcode, name,
    sale_price, wholesale_price, tax_rate_bps,
    is_active, is_archived,
    created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE sku = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a product row.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name,
                sale_price, wholesale_price, tax_rate_bps,
                is_active, is_archived,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.sale_price)
        .bind(product.wholesale_price)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .bind(product.is_archived)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Loads the given products inside the caller's transaction.
    ///
    /// Unknown ids are simply absent from the map.
    pub async fn fetch_many(
        conn: &mut SqliteConnection,
        ids: &[&str],
    ) -> DbResult<HashMap<String, Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let mut products = HashMap::with_capacity(ids.len());

        for id in ids {
            if let Some(product) = sqlx::query_as::<_, Product>(&sql)
                .bind(*id)
                .fetch_optional(&mut *conn)
                .await?
            {
                products.insert(product.id.clone(), product);
            }
        }

        Ok(products)
    }
}
