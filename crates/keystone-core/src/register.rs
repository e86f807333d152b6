//! # Register Module
//!
//! Business-day arithmetic and the cash-session rules built on it.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NO_SESSION ──open (before cutoff)──► OPEN ──close (MANUAL)──► CLOSED │
//! │                                          │                       ▲      │
//! │                                          │ evaluate(now)         │      │
//! │                                          ├─ opened on an earlier ┘      │
//! │                                          │  business day → DAY_CHANGE   │
//! │                                          └─ local now ≥ cutoff          │
//! │                                             → CUTOFF                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Business Calendar
//! Every date comparison happens in the branch's configured timezone, never
//! the host's. `now` is always an argument; nothing here reads the clock.
//!
//! Local times that do not exist (spring-forward gap) resolve to the first
//! valid instant after them; ambiguous local times (fall-back overlap)
//! resolve to the earlier instant.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CashGateReason, ValidationError};
use crate::money::Money;
use crate::types::{CloseReason, PaymentMethod};

// =============================================================================
// Business Calendar
// =============================================================================

/// Timezone and daily cutoff of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    pub timezone: Tz,
    /// Local time after which sessions close and none may open.
    pub cutoff: NaiveTime,
}

impl BusinessCalendar {
    pub fn new(timezone: Tz, cutoff: NaiveTime) -> Self {
        BusinessCalendar { timezone, cutoff }
    }

    /// Parses an IANA timezone name and an `HH:MM` (or `HH:MM:SS`) cutoff.
    ///
    /// ```rust
    /// use keystone_core::register::BusinessCalendar;
    ///
    /// let cal = BusinessCalendar::parse("America/Mexico_City", "22:00").unwrap();
    /// assert_eq!(cal.cutoff.to_string(), "22:00:00");
    /// assert!(BusinessCalendar::parse("Mars/Olympus", "22:00").is_err());
    /// ```
    pub fn parse(timezone: &str, cutoff: &str) -> Result<Self, ValidationError> {
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timezone".to_string(),
                reason: format!("unknown IANA timezone '{}'", timezone),
            })?;

        let cutoff = parse_cutoff(cutoff)?;
        Ok(BusinessCalendar::new(tz, cutoff))
    }

    /// Local calendar date of an instant.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// First instant of a local date.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_instant(date.and_time(NaiveTime::MIN))
    }

    /// The cutoff instant on a local date.
    pub fn cutoff_on(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_instant(date.and_time(self.cutoff))
    }

    /// Whether `now` is at or after today's cutoff.
    pub fn is_past_cutoff(&self, now: DateTime<Utc>) -> bool {
        now >= self.cutoff_on(self.business_date(now))
    }

    /// Whether a session may be opened at `now`.
    pub fn can_open(&self, now: DateTime<Utc>) -> Result<(), CashGateReason> {
        if self.is_past_cutoff(now) {
            Err(CashGateReason::Cutoff)
        } else {
            Ok(())
        }
    }

    /// Decides whether a session opened at `opened_at` is still usable.
    pub fn evaluate(&self, opened_at: DateTime<Utc>, now: DateTime<Utc>) -> SessionState {
        let today = self.business_date(now);

        if self.business_date(opened_at) < today {
            return SessionState::Expired {
                reason: CloseReason::DayChange,
                close_at: clamp(self.start_of_day(today), opened_at, now),
            };
        }

        if self.is_past_cutoff(now) {
            return SessionState::Expired {
                reason: CloseReason::Cutoff,
                close_at: clamp(self.cutoff_on(today), opened_at, now),
            };
        }

        SessionState::Active
    }

    fn local_instant(&self, local: NaiveDateTime) -> DateTime<Utc> {
        if let Some(t) = self.timezone.from_local_datetime(&local).earliest() {
            return t.with_timezone(&Utc);
        }

        // Inside a DST gap: walk forward to the first wall-clock minute that exists.
        (1..=24 * 60)
            .filter_map(|m| {
                self.timezone
                    .from_local_datetime(&(local + Duration::minutes(m)))
                    .earliest()
            })
            .next()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }
}

fn parse_cutoff(text: &str) -> Result<NaiveTime, ValidationError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidFormat {
            field: "cutoff".to_string(),
            reason: format!("expected HH:MM, got '{}'", text),
        })
}

fn clamp(t: DateTime<Utc>, lo: DateTime<Utc>, hi: DateTime<Utc>) -> DateTime<Utc> {
    t.max(lo).min(hi.max(lo))
}

/// Result of [`BusinessCalendar::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// The session must be closed at `close_at` with `reason`.
    Expired {
        reason: CloseReason,
        close_at: DateTime<Utc>,
    },
}

impl SessionState {
    /// The gate reason a sale is rejected with, if any.
    pub fn gate_reason(&self) -> Option<CashGateReason> {
        match self {
            SessionState::Active => None,
            SessionState::Expired {
                reason: CloseReason::DayChange,
                ..
            } => Some(CashGateReason::DayChange),
            SessionState::Expired { .. } => Some(CashGateReason::Cutoff),
        }
    }
}

// =============================================================================
// Session Totals
// =============================================================================

/// Per-method sums over the confirmed sales of a session window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionTotals {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    pub sale_count: i64,
}

impl SessionTotals {
    /// Folds `(method, amount applied)` pairs, one per sale.
    pub fn from_payments<I>(payments: I) -> Self
    where
        I: IntoIterator<Item = (PaymentMethod, Money)>,
    {
        payments
            .into_iter()
            .fold(SessionTotals::default(), |mut acc, (method, amount)| {
                match method {
                    PaymentMethod::Cash => acc.cash += amount,
                    PaymentMethod::Card => acc.card += amount,
                    PaymentMethod::Transfer => acc.transfer += amount,
                }
                acc.sale_count += 1;
                acc
            })
    }

    pub fn grand_total(&self) -> Money {
        self.cash + self.card + self.transfer
    }
}

/// Figures written onto a session when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClose {
    pub closed_at: DateTime<Utc>,
    pub reason: CloseReason,
    pub totals: SessionTotals,
    /// Opening float plus cash sales, not the cash sales total alone.
    /// Change handed back comes out of the tendered amount, so it does not
    /// reduce the drawer below this.
    pub expected_cash: Money,
    pub counted_cash: Option<Money>,
    /// `counted_cash - expected_cash`, i.e. measured against the float plus
    /// cash sales. A drawer holding exactly its float and takings is 0.
    pub variance: Option<Money>,
}

impl SessionClose {
    pub fn compute(
        opening_float: Money,
        totals: SessionTotals,
        counted_cash: Option<Money>,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
    ) -> Self {
        let expected_cash = opening_float + totals.cash;
        SessionClose {
            closed_at,
            reason,
            totals,
            expected_cash,
            counted_cash,
            variance: counted_cash.map(|counted| counted - expected_cash),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn mexico() -> BusinessCalendar {
        // UTC-6 year round since 2022
        BusinessCalendar::parse("America/Mexico_City", "22:00").unwrap()
    }

    #[test]
    fn test_business_date_uses_branch_timezone() {
        let cal = mexico();
        // 03:00 UTC on the 2nd is 21:00 local on the 1st
        assert_eq!(
            cal.business_date(utc("2024-03-02T03:00:00Z")),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_same_day_before_cutoff_is_active() {
        let cal = mexico();
        let opened = utc("2024-03-01T14:00:00Z"); // 08:00 local
        let now = utc("2024-03-01T20:00:00Z"); // 14:00 local
        assert_eq!(cal.evaluate(opened, now), SessionState::Active);
    }

    #[test]
    fn test_next_day_expires_with_day_change_at_midnight() {
        let cal = mexico();
        let opened = utc("2024-03-01T14:00:00Z"); // day N 08:00 local
        let now = utc("2024-03-02T15:00:00Z"); // day N+1 09:00 local

        let state = cal.evaluate(opened, now);
        assert_eq!(
            state,
            SessionState::Expired {
                reason: CloseReason::DayChange,
                close_at: utc("2024-03-02T06:00:00Z"), // local midnight
            }
        );
        assert_eq!(state.gate_reason(), Some(CashGateReason::DayChange));
    }

    #[test]
    fn test_past_cutoff_expires_at_cutoff_instant() {
        let cal = mexico();
        let opened = utc("2024-03-01T14:00:00Z");
        let now = utc("2024-03-02T04:30:00Z"); // 22:30 local on the 1st

        assert_eq!(
            cal.evaluate(opened, now),
            SessionState::Expired {
                reason: CloseReason::Cutoff,
                close_at: utc("2024-03-02T04:00:00Z"),
            }
        );
    }

    #[test]
    fn test_close_instant_never_precedes_open() {
        let cal = mexico();
        // Opened after the cutoff (cutoff was moved earlier since)
        let opened = utc("2024-03-02T04:10:00Z");
        let now = utc("2024-03-02T04:20:00Z");
        match cal.evaluate(opened, now) {
            SessionState::Expired { close_at, .. } => assert_eq!(close_at, opened),
            other => panic!("expected expiry, got {:?}", other),
        }
    }

    #[test]
    fn test_can_open_rejects_after_cutoff() {
        let cal = mexico();
        assert!(cal.can_open(utc("2024-03-01T20:00:00Z")).is_ok());
        assert_eq!(
            cal.can_open(utc("2024-03-02T04:00:00Z")),
            Err(CashGateReason::Cutoff)
        );
    }

    #[test]
    fn test_dst_gap_cutoff_moves_forward() {
        // 2024-03-10 02:30 does not exist in New York
        let cal = BusinessCalendar::parse("America/New_York", "02:30").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(cal.cutoff_on(date), utc("2024-03-10T07:00:00Z")); // 03:00 EDT
    }

    #[test]
    fn test_dst_overlap_takes_earlier_instant() {
        // 2024-11-03 01:30 happens twice in New York
        let cal = BusinessCalendar::parse("America/New_York", "01:30").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        assert_eq!(cal.cutoff_on(date), utc("2024-11-03T05:30:00Z")); // 01:30 EDT
    }

    #[test]
    fn test_parse_cutoff_formats() {
        assert!(BusinessCalendar::parse("UTC", "21:30:15").is_ok());
        assert!(BusinessCalendar::parse("UTC", "9pm").is_err());
    }

    #[test]
    fn test_totals_and_variance() {
        let totals = SessionTotals::from_payments(vec![
            (PaymentMethod::Cash, Money::from_cents(10_000)),
            (PaymentMethod::Card, Money::from_cents(2_500)),
            (PaymentMethod::Cash, Money::from_cents(500)),
        ]);
        assert_eq!(totals.cash.cents(), 10_500);
        assert_eq!(totals.sale_count, 3);
        assert_eq!(totals.grand_total().cents(), 13_000);

        let close = SessionClose::compute(
            Money::from_cents(5_000),
            totals,
            Some(Money::from_cents(15_400)),
            CloseReason::Manual,
            utc("2024-03-01T20:00:00Z"),
        );
        assert_eq!(close.expected_cash.cents(), 15_500);
        assert_eq!(close.variance, Some(Money::from_cents(-100)));

        // Float plus cash takings exactly: no variance
        let exact = SessionClose::compute(
            Money::from_cents(5_000),
            totals,
            Some(Money::from_cents(15_500)),
            CloseReason::Manual,
            utc("2024-03-01T20:00:00Z"),
        );
        assert_eq!(exact.variance, Some(Money::zero()));

        let auto = SessionClose::compute(
            Money::zero(),
            totals,
            None,
            CloseReason::Cutoff,
            utc("2024-03-01T20:00:00Z"),
        );
        assert_eq!(auto.variance, None);
    }
}
