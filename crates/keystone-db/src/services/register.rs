//! # Register Service
//!
//! Cash-register sessions and the gate every sale passes through.
//!
//! ## Gate Before Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  find open session (operator, branch)                                   │
//! │       │                                                                 │
//! │       ├── none ──────────────────────► Reject(NO_SESSION)               │
//! │       │                                 nothing written                 │
//! │       ▼                                                                 │
//! │  calendar.evaluate(opened_at, now)                                      │
//! │       │                                                                 │
//! │       ├── Active ────────────────────► Pass(session)                    │
//! │       │                                                                 │
//! │       └── Expired { reason, close_at }                                  │
//! │              │                                                          │
//! │              ▼                                                          │
//! │          auto-close at close_at ─────► Reject(DAY_CHANGE | CUTOFF)      │
//! │                                         caller COMMITS the close and    │
//! │                                         then reports the rejection      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Auto-close totals cover the confirmed sales in `[opened_at, close_at]`;
//! counted cash and variance stay empty until someone counts the drawer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DbError, PosResult};
use crate::pool::Database;
use crate::repository::sale::SaleRepository;
use crate::repository::session::SessionRepository;
use crate::services::inventory::InventoryService;
use crate::services::lock_branch;
use keystone_core::validation::{validate_counted_cash, validate_id, validate_opening_float};
use keystone_core::{
    BusinessCalendar, CashGateError, CashGateReason, CashSession, CloseReason, CoreError, Money,
    SessionClose, SessionState,
};

/// Outcome of the gate.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// The session is open and current; the sale may proceed.
    Pass(CashSession),
    /// The sale must be rejected. `closed` holds the session the gate just
    /// auto-closed; that close must be committed before reporting `error`.
    Reject {
        error: CashGateError,
        closed: Option<CashSession>,
    },
}

/// Opens, closes, and expires cash-register sessions.
#[derive(Clone)]
pub struct RegisterService {
    db: Database,
    calendar: BusinessCalendar,
    clock: Arc<dyn Clock>,
}

impl RegisterService {
    pub fn new(db: Database, calendar: BusinessCalendar, clock: Arc<dyn Clock>) -> Self {
        RegisterService {
            db,
            calendar,
            clock,
        }
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    /// Opens a session for the operator at the branch.
    ///
    /// An open session that has already expired is auto-closed first, in
    /// the same transaction.
    pub async fn open_session(
        &self,
        operator_id: &str,
        branch_id: &str,
        opening_float: Money,
    ) -> PosResult<CashSession> {
        validate_id("operator_id", operator_id)?;
        validate_id("branch_id", branch_id)?;
        validate_opening_float(opening_float)?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        InventoryService::resolve_in(&mut *tx, branch_id).await?;

        if let Err(reason) = self.calendar.can_open(now) {
            warn!(operator_id, branch_id, ?reason, "Session open rejected");
            return Err(CashGateError {
                reason,
                operator_id: operator_id.to_string(),
                branch_id: branch_id.to_string(),
                session_id: None,
            }
            .into());
        }

        if let Some(existing) = SessionRepository::find_open(&mut *tx, operator_id, branch_id).await? {
            match self.calendar.evaluate(existing.opened_at, now) {
                SessionState::Active => {
                    return Err(CoreError::SessionAlreadyOpen {
                        session_id: existing.id,
                        operator_id: operator_id.to_string(),
                        branch_id: branch_id.to_string(),
                    }
                    .into());
                }
                SessionState::Expired { reason, close_at } => {
                    self.auto_close_in(&mut *tx, &existing, reason, close_at).await?;
                }
            }
        }

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            operator_id: operator_id.to_string(),
            branch_id: branch_id.to_string(),
            opening_float,
            opened_at: now,
            closed_at: None,
            cash_total: Money::zero(),
            card_total: Money::zero(),
            transfer_total: Money::zero(),
            sale_count: 0,
            expected_cash: None,
            counted_cash: None,
            variance: None,
            close_reason: None,
        };
        SessionRepository::insert(&mut *tx, &session).await?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            operator_id,
            branch_id,
            opening_float = %opening_float,
            "Cash session opened"
        );
        Ok(session)
    }

    /// Closes the operator's open session at now (MANUAL).
    pub async fn close_session(
        &self,
        operator_id: &str,
        branch_id: &str,
        counted_cash: Option<Money>,
    ) -> PosResult<CashSession> {
        validate_id("operator_id", operator_id)?;
        validate_id("branch_id", branch_id)?;
        if let Some(counted) = counted_cash {
            validate_counted_cash(counted)?;
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        let session = SessionRepository::find_open(&mut *tx, operator_id, branch_id)
            .await?
            .ok_or_else(|| CoreError::NoOpenSession {
                operator_id: operator_id.to_string(),
                branch_id: branch_id.to_string(),
            })?;

        let closed = self
            .close_in(&mut *tx, &session, CloseReason::Manual, now, counted_cash)
            .await?;

        tx.commit().await?;

        info!(
            session_id = %closed.id,
            operator_id,
            branch_id,
            expected_cash = ?closed.expected_cash,
            variance = ?closed.variance,
            "Cash session closed"
        );
        Ok(closed)
    }

    /// The operator's current session, if it is open and not expired.
    ///
    /// An expired session found here is auto-closed on the spot, so callers
    /// never see a session the next sale would reject.
    pub async fn current_session(
        &self,
        operator_id: &str,
        branch_id: &str,
    ) -> PosResult<Option<CashSession>> {
        let Some(session) = self.db.sessions().current(operator_id, branch_id).await? else {
            return Ok(None);
        };

        match self.calendar.evaluate(session.opened_at, self.clock.now()) {
            SessionState::Active => Ok(Some(session)),
            SessionState::Expired { .. } => {
                self.expire(&session).await?;
                Ok(None)
            }
        }
    }

    /// Auto-closes every open session that has expired. Returns the
    /// sessions closed by this call.
    pub async fn auto_close_due(&self) -> PosResult<Vec<CashSession>> {
        let now = self.clock.now();
        let mut closed = Vec::new();

        for session in self.db.sessions().list_open().await? {
            if let SessionState::Expired { .. } = self.calendar.evaluate(session.opened_at, now) {
                if let Some(c) = self.expire(&session).await? {
                    closed.push(c);
                }
            }
        }

        if !closed.is_empty() {
            info!(count = closed.len(), "Auto-closed expired cash sessions");
        }
        Ok(closed)
    }

    /// Auto-closes one session in its own transaction. Returns `None` if it
    /// was closed by someone else in the meantime.
    async fn expire(&self, session: &CashSession) -> PosResult<Option<CashSession>> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, &session.branch_id).await?;

        let Some(current) = SessionRepository::get_in(&mut *tx, &session.id).await? else {
            return Ok(None);
        };
        if !current.is_open() {
            return Ok(None);
        }

        let closed = match self.calendar.evaluate(current.opened_at, now) {
            SessionState::Expired { reason, close_at } => {
                self.auto_close_in(&mut *tx, &current, reason, close_at).await?
            }
            SessionState::Active => return Ok(None),
        };

        tx.commit().await?;
        Ok(Some(closed))
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Runs the gate inside the caller's transaction.
    pub async fn gate_in(
        &self,
        conn: &mut SqliteConnection,
        operator_id: &str,
        branch_id: &str,
        now: DateTime<Utc>,
    ) -> PosResult<GateDecision> {
        let Some(session) = SessionRepository::find_open(conn, operator_id, branch_id).await? else {
            warn!(operator_id, branch_id, "Sale rejected: no open session");
            return Ok(GateDecision::Reject {
                error: CashGateError::no_session(operator_id, branch_id),
                closed: None,
            });
        };

        let state = self.calendar.evaluate(session.opened_at, now);
        let (reason, close_at) = match state {
            SessionState::Active => return Ok(GateDecision::Pass(session)),
            SessionState::Expired { reason, close_at } => (reason, close_at),
        };

        let closed = self.auto_close_in(conn, &session, reason, close_at).await?;
        let gate_reason = state.gate_reason().unwrap_or(CashGateReason::Cutoff);
        warn!(
            operator_id,
            branch_id,
            session_id = %closed.id,
            reason = ?gate_reason,
            "Sale rejected: session expired and was auto-closed"
        );

        Ok(GateDecision::Reject {
            error: CashGateError {
                reason: gate_reason,
                operator_id: operator_id.to_string(),
                branch_id: branch_id.to_string(),
                session_id: Some(closed.id.clone()),
            },
            closed: Some(closed),
        })
    }

    /// Closes an expired session at `close_at` without a cash count.
    pub async fn auto_close_in(
        &self,
        conn: &mut SqliteConnection,
        session: &CashSession,
        reason: CloseReason,
        close_at: DateTime<Utc>,
    ) -> PosResult<CashSession> {
        let closed = self.close_in(conn, session, reason, close_at, None).await?;
        info!(
            session_id = %closed.id,
            reason = %reason,
            closed_at = %close_at,
            "Cash session auto-closed"
        );
        Ok(closed)
    }

    async fn close_in(
        &self,
        conn: &mut SqliteConnection,
        session: &CashSession,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
        counted_cash: Option<Money>,
    ) -> PosResult<CashSession> {
        let totals = SaleRepository::payment_totals(
            conn,
            &session.operator_id,
            &session.branch_id,
            session.opened_at,
            closed_at,
        )
        .await?;

        let close = SessionClose::compute(session.opening_float, totals, counted_cash, reason, closed_at);

        // Already closed: the stored figures stand
        SessionRepository::close(conn, &session.id, &close).await?;

        SessionRepository::get_in(conn, &session.id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", &session.id).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
