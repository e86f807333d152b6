//! # Stock Repository
//!
//! The stock ledger: one row per (product, location).
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • Rows are created lazily and idempotently                             │
//! │      INSERT ... ON CONFLICT (product_id, location_id) DO NOTHING        │
//! │  • Rows are never deleted; an empty location holds quantity 0           │
//! │  • Debits are guarded in the UPDATE itself                              │
//! │      UPDATE ... SET quantity = quantity - ?                             │
//! │      WHERE ... AND quantity >= ?                                        │
//! │    zero rows affected → not enough stock, nothing changed               │
//! │  • CHECK (quantity >= 0) in the schema backs the guard                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use keystone_core::{Quantity, StockEntry, StockLevels};

/// Repository for stock entries.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Gets the entry for a product at a location.
    pub async fn entry(&self, product_id: &str, location_id: &str) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT product_id, location_id, quantity, created_at, updated_at
            FROM stock_entries
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// On-hand quantity, zero when no entry exists.
    pub async fn quantity(&self, product_id: &str, location_id: &str) -> DbResult<Quantity> {
        Ok(self
            .entry(product_id, location_id)
            .await?
            .map(|e| e.quantity)
            .unwrap_or_default())
    }

    /// Every entry of a product, across all locations.
    pub async fn entries_for_product(&self, product_id: &str) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT product_id, location_id, quantity, created_at, updated_at
            FROM stock_entries
            WHERE product_id = ?1
            ORDER BY location_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Creates the entry with quantity 0 if it doesn't exist.
    pub async fn ensure_entry(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_entries (product_id, location_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            ON CONFLICT (product_id, location_id) DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Quantity at a location, `None` when no entry exists.
    pub async fn quantity_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
    ) -> DbResult<Option<Quantity>> {
        let quantity = sqlx::query_scalar::<_, Quantity>(
            "SELECT quantity FROM stock_entries WHERE product_id = ?1 AND location_id = ?2",
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(quantity)
    }

    /// Front and reserve levels for each product.
    pub async fn levels_in(
        conn: &mut SqliteConnection,
        front_id: &str,
        reserve_id: &str,
        product_ids: &[&str],
    ) -> DbResult<HashMap<String, StockLevels>> {
        let mut levels = HashMap::with_capacity(product_ids.len());

        for product_id in product_ids {
            let front = Self::quantity_in(conn, product_id, front_id)
                .await?
                .unwrap_or_default();
            let reserve = Self::quantity_in(conn, product_id, reserve_id)
                .await?
                .unwrap_or_default();
            levels.insert(product_id.to_string(), StockLevels::new(front, reserve));
        }

        Ok(levels)
    }

    /// Guarded decrement. Returns false, changing nothing, when the entry
    /// is missing or holds less than `quantity`.
    pub async fn debit(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE stock_entries
            SET quantity = quantity - ?3, updated_at = ?4
            WHERE product_id = ?1 AND location_id = ?2 AND quantity >= ?3
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let applied = result.rows_affected() == 1;
        debug!(product_id, location_id, %quantity, applied, "Stock debit");
        Ok(applied)
    }

    /// Increment, creating the entry if needed.
    pub async fn credit(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        Self::ensure_entry(conn, product_id, location_id, now).await?;

        sqlx::query(
            r#"
            UPDATE stock_entries
            SET quantity = quantity + ?3, updated_at = ?4
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(product_id, location_id, %quantity, "Stock credit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::DbError;
    use crate::test_support::{units, Fixture};

    #[tokio::test]
    async fn test_guarded_debit_never_goes_negative() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(2)).await;
        let now = fx.clock.now();

        let mut tx = fx.db.begin().await.unwrap();
        assert!(!StockRepository::debit(&mut *tx, "p1", &fx.front_id, units(3), now).await.unwrap());
        assert!(StockRepository::debit(&mut *tx, "p1", &fx.front_id, units(2), now).await.unwrap());
        assert!(!StockRepository::debit(&mut *tx, "p1", &fx.front_id, units(1), now).await.unwrap());
        // No entry at all
        assert!(!StockRepository::debit(&mut *tx, "p2", &fx.front_id, units(1), now).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(fx.front_qty("p1").await, Quantity::zero());
    }

    #[tokio::test]
    async fn test_check_constraint_backs_the_guard() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(1)).await;

        let err = sqlx::query("UPDATE stock_entries SET quantity = -1 WHERE product_id = 'p1'")
            .execute(fx.db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_ensure_entry_is_idempotent() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(4)).await;
        let now = fx.clock.now();

        let mut tx = fx.db.begin().await.unwrap();
        StockRepository::ensure_entry(&mut *tx, "p1", &fx.front_id, now).await.unwrap();
        StockRepository::ensure_entry(&mut *tx, "p1", &fx.front_id, now).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fx.front_qty("p1").await, units(4));
        assert_eq!(fx.db.stock().entries_for_product("p1").await.unwrap().len(), 1);
    }
}
