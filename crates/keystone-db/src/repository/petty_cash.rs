//! # Petty Cash Repository
//!
//! Change handed back on cash sales, recorded against the open session.
//! These rows are informational: expected cash at close is opening float
//! plus cash sales, and is not reduced by them.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use keystone_core::{Money, PettyCashExpense};

/// Repository for petty cash expenses.
#[derive(Debug, Clone)]
pub struct PettyCashRepository {
    pool: SqlitePool,
}

impl PettyCashRepository {
    /// Creates a new PettyCashRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PettyCashRepository { pool }
    }

    /// Expenses of a session, oldest first.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<PettyCashExpense>> {
        let expenses = sqlx::query_as::<_, PettyCashExpense>(
            r#"
            SELECT id, session_id, operator_id, branch_id, sale_id, amount, description, created_at
            FROM petty_cash_expenses
            WHERE session_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Sum of a session's expenses.
    pub async fn total_for_session(&self, session_id: &str) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM petty_cash_expenses WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Records an expense.
    pub async fn insert(conn: &mut SqliteConnection, expense: &PettyCashExpense) -> DbResult<()> {
        debug!(
            session_id = %expense.session_id,
            sale_id = %expense.sale_id,
            amount = %expense.amount,
            "Recording petty cash"
        );

        sqlx::query(
            r#"
            INSERT INTO petty_cash_expenses (
                id, session_id, operator_id, branch_id, sale_id, amount, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.session_id)
        .bind(&expense.operator_id)
        .bind(&expense.branch_id)
        .bind(&expense.sale_id)
        .bind(expense.amount)
        .bind(&expense.description)
        .bind(expense.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
