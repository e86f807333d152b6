//! # Sale Repository
//!
//! Sales, their lines, and their single payment.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  All inside one transaction owned by the checkout service:              │
//! │                                                                         │
//! │  1. insert_sale()     → Sale { status: PENDING }                        │
//! │  2. insert_line()     → SaleLine (one per merged basket line)           │
//! │  3. insert_payment()  → Payment (exactly one)                           │
//! │  4. confirm()         → Sale { status: CONFIRMED, confirmed_at }        │
//! │                                                                         │
//! │  A rolled back transaction leaves nothing behind, so a PENDING sale     │
//! │  is never visible to another connection.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use keystone_core::{Money, Payment, PaymentMethod, Sale, SaleLine, SessionTotals};

const SALE_COLUMNS: &str = r#"
    id, receipt_number, branch_id, operator_id, customer_id, status,
    subtotal, discount, tax, total, created_at, confirmed_at
"#;

const LINE_COLUMNS: &str = r#"
    id, sale_id, product_id, sku_snapshot, name_snapshot, quantity,
    unit_price, price_tier, discount, tax, line_total, created_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, sale_id, method, amount, tendered, change_given,
    reference, card_brand, created_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = ?1",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale by its branch-scoped receipt number.
    pub async fn get_by_receipt(&self, branch_id: &str, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE branch_id = ?1 AND receipt_number = ?2",
            SALE_COLUMNS
        ))
        .bind(branch_id)
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lines of a sale in insertion order.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "SELECT {} FROM sale_lines WHERE sale_id = ?1 ORDER BY rowid",
            LINE_COLUMNS
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// The payment of a sale.
    pub async fn get_payment(&self, sale_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE sale_id = ?1",
            PAYMENT_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Confirmed sales of a branch since `since`, newest first.
    pub async fn confirmed_since(&self, branch_id: &str, since: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {} FROM sales
            WHERE branch_id = ?1 AND status = 'CONFIRMED' AND confirmed_at >= ?2
            ORDER BY confirmed_at DESC
            "#,
            SALE_COLUMNS
        ))
        .bind(branch_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Counts all sales, any status.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Inserts the sale header.
    pub async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, branch_id, operator_id, customer_id, status,
                subtotal, discount, tax, total, created_at, confirmed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.branch_id)
        .bind(&sale.operator_id)
        .bind(&sale.customer_id)
        .bind(sale.status)
        .bind(sale.subtotal)
        .bind(sale.discount)
        .bind(sale.tax)
        .bind(sale.total)
        .bind(sale.created_at)
        .bind(sale.confirmed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one sale line.
    pub async fn insert_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, sku_snapshot, name_snapshot, quantity,
                unit_price, price_tier, discount, tax, line_total, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.price_tier)
        .bind(line.discount)
        .bind(line.tax)
        .bind(line.line_total)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts the payment. A second payment for the same sale violates
    /// `UNIQUE (sale_id)`.
    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(
            sale_id = %payment.sale_id,
            method = %payment.method,
            amount = %payment.amount,
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, method, amount, tendered, change_given,
                reference, card_brand, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.amount)
        .bind(payment.tendered)
        .bind(payment.change_given)
        .bind(&payment.reference)
        .bind(&payment.card_brand)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Moves a PENDING sale to CONFIRMED.
    pub async fn confirm(conn: &mut SqliteConnection, sale_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales SET status = 'CONFIRMED', confirmed_at = ?2 WHERE id = ?1 AND status = 'PENDING'",
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PendingSale", sale_id));
        }

        Ok(())
    }

    /// Per-method sums of the operator's confirmed sales on a branch with
    /// `from <= confirmed_at <= to`.
    pub async fn payment_totals(
        conn: &mut SqliteConnection,
        operator_id: &str,
        branch_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<SessionTotals> {
        let rows: Vec<(PaymentMethod, Money)> = sqlx::query_as(
            r#"
            SELECT p.method, p.amount
            FROM payments p
            JOIN sales s ON s.id = p.sale_id
            WHERE s.status = 'CONFIRMED'
              AND s.operator_id = ?1
              AND s.branch_id = ?2
              AND s.confirmed_at >= ?3
              AND s.confirmed_at <= ?4
            "#,
        )
        .bind(operator_id)
        .bind(branch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(SessionTotals::from_payments(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::repository::receipt::next_receipt_number;
    use crate::test_support::Fixture;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_receipt_sequence_is_per_branch_and_day() {
        let fx = Fixture::new().await;
        let other = fx.db.branches().insert("Norte", fx.clock.now()).await.unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let mut tx = fx.db.begin().await.unwrap();
        let a = next_receipt_number(&mut *tx, &fx.branch_id, day1).await.unwrap();
        let b = next_receipt_number(&mut *tx, &fx.branch_id, day1).await.unwrap();
        let c = next_receipt_number(&mut *tx, &other.id, day1).await.unwrap();
        let d = next_receipt_number(&mut *tx, &fx.branch_id, day2).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a, "20240301-0001");
        assert_eq!(b, "20240301-0002");
        assert_eq!(c, "20240301-0001");
        assert_eq!(d, "20240302-0001");
    }

    #[tokio::test]
    async fn test_rolled_back_number_is_reissued() {
        let fx = Fixture::new().await;
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        {
            let mut tx = fx.db.begin().await.unwrap();
            next_receipt_number(&mut *tx, &fx.branch_id, day).await.unwrap();
            // dropped without commit
        }

        let mut tx = fx.db.begin().await.unwrap();
        let number = next_receipt_number(&mut *tx, &fx.branch_id, day).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(number, "20240301-0001");

        let totals = {
            let mut tx = fx.db.begin().await.unwrap();
            let t = SaleRepository::payment_totals(
                &mut *tx,
                "op-1",
                &fx.branch_id,
                fx.clock.now(),
                fx.clock.now(),
            )
            .await
            .unwrap();
            tx.rollback().await.unwrap();
            t
        };
        assert_eq!(totals, SessionTotals::default());
    }
}
