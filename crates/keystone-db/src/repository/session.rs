//! # Session Repository
//!
//! Cash-register sessions: one open session per (operator, branch).
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • idx_cash_sessions_one_open is a partial UNIQUE index on              │
//! │    (operator_id, branch_id) WHERE closed_at IS NULL                     │
//! │  • close() only touches a row whose closed_at IS NULL; closing twice    │
//! │    is a no-op that reports false                                        │
//! │  • A closed row is never updated again                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use keystone_core::{CashSession, SessionClose};

const SESSION_COLUMNS: &str = r#"
    id, operator_id, branch_id, opening_float, opened_at, closed_at,
    cash_total, card_total, transfer_total, sale_count,
    expected_cash, counted_cash, variance, close_reason
"#;

/// Repository for cash-register sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// The open session of an operator at a branch, as stored.
    ///
    /// This does not evaluate expiry; see `RegisterService::current_session`.
    pub async fn current(&self, operator_id: &str, branch_id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE operator_id = ?1 AND branch_id = ?2 AND closed_at IS NULL",
            SESSION_COLUMNS
        ))
        .bind(operator_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Every open session, oldest first.
    pub async fn list_open(&self) -> DbResult<Vec<CashSession>> {
        let sessions = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE closed_at IS NULL ORDER BY opened_at",
            SESSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Sessions of an operator at a branch, newest first.
    pub async fn history(&self, operator_id: &str, branch_id: &str, limit: i64) -> DbResult<Vec<CashSession>> {
        let sessions = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {} FROM cash_sessions
            WHERE operator_id = ?1 AND branch_id = ?2
            ORDER BY opened_at DESC
            LIMIT ?3
            "#,
            SESSION_COLUMNS
        ))
        .bind(operator_id)
        .bind(branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// The open session, read inside the caller's transaction.
    pub async fn find_open(
        conn: &mut SqliteConnection,
        operator_id: &str,
        branch_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE operator_id = ?1 AND branch_id = ?2 AND closed_at IS NULL",
            SESSION_COLUMNS
        ))
        .bind(operator_id)
        .bind(branch_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// A session by ID, read inside the caller's transaction.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Inserts a freshly opened session.
    pub async fn insert(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(
            id = %session.id,
            operator_id = %session.operator_id,
            branch_id = %session.branch_id,
            opening_float = %session.opening_float,
            "Opening cash session"
        );

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, operator_id, branch_id, opening_float, opened_at, closed_at,
                cash_total, card_total, transfer_total, sale_count,
                expected_cash, counted_cash, variance, close_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0, 0, 0, 0, NULL, NULL, NULL, NULL)
            "#,
        )
        .bind(&session.id)
        .bind(&session.operator_id)
        .bind(&session.branch_id)
        .bind(session.opening_float)
        .bind(session.opened_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the closing figures. Returns false if the session was already
    /// closed (or does not exist); nothing changes in that case.
    pub async fn close(conn: &mut SqliteConnection, id: &str, close: &SessionClose) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                closed_at = ?2,
                cash_total = ?3,
                card_total = ?4,
                transfer_total = ?5,
                sale_count = ?6,
                expected_cash = ?7,
                counted_cash = ?8,
                variance = ?9,
                close_reason = ?10
            WHERE id = ?1 AND closed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(close.closed_at)
        .bind(close.totals.cash)
        .bind(close.totals.card)
        .bind(close.totals.transfer)
        .bind(close.totals.sale_count)
        .bind(close.expected_cash)
        .bind(close.counted_cash)
        .bind(close.variance)
        .bind(close.reason)
        .execute(&mut *conn)
        .await?;

        let closed = result.rows_affected() == 1;
        debug!(id, reason = %close.reason, closed, "Closing cash session");
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::DbError;
    use crate::test_support::Fixture;
    use keystone_core::Money;

    fn open_session(id: &str, fx: &Fixture) -> CashSession {
        CashSession {
            id: id.to_string(),
            operator_id: "op-1".to_string(),
            branch_id: fx.branch_id.clone(),
            opening_float: Money::zero(),
            opened_at: fx.clock.now(),
            closed_at: None,
            cash_total: Money::zero(),
            card_total: Money::zero(),
            transfer_total: Money::zero(),
            sale_count: 0,
            expected_cash: None,
            counted_cash: None,
            variance: None,
            close_reason: None,
        }
    }

    #[tokio::test]
    async fn test_one_open_session_per_operator_and_branch() {
        let fx = Fixture::new().await;

        let mut tx = fx.db.begin().await.unwrap();
        SessionRepository::insert(&mut *tx, &open_session("s1", &fx)).await.unwrap();
        let err = SessionRepository::insert(&mut *tx, &open_session("s2", &fx))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        tx.commit().await.unwrap();

        assert_eq!(fx.db.sessions().list_open().await.unwrap().len(), 1);
    }
}
