//! # Checkout Service
//!
//! The sale commit protocol. One call, one transaction.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request (ids, merged basket, amount received)                 │
//! │       │                                                                 │
//! │  BEGIN ─ lock branch                                                    │
//! │       │                                                                 │
//! │  1. gate ─────────── NO_SESSION → rollback                              │
//! │       │              DAY_CHANGE / CUTOFF → commit auto-close, reject    │
//! │  2. allocate ─────── reserve → front transfers (TRANSFER)               │
//! │  3. price ────────── standard / wholesale, exclusive tax                │
//! │  4. settle ───────── cash covers total / card & transfer exact          │
//! │  5. receipt number, Sale (PENDING), SaleLines, Payment                  │
//! │  6. per line: guarded front debit + OUT movement                        │
//! │  7. Sale → CONFIRMED                                                    │
//! │  8. change > 0 → petty cash against the session                         │
//! │       │                                                                 │
//! │  COMMIT ─ publish SaleConfirmed ─ return SaleReceipt                    │
//! │                                                                         │
//! │  Any error between BEGIN and COMMIT drops the transaction: no sale,     │
//! │  line, payment, movement, or stock change survives.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::PosResult;
use crate::events::{SaleConfirmed, SaleEvents};
use crate::pool::Database;
use crate::repository::movement::{MovementRepository, NewMovement};
use crate::repository::petty_cash::PettyCashRepository;
use crate::repository::receipt::next_receipt_number;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;
use crate::services::inventory::{require_products, shortage_error, InventoryService};
use crate::services::register::{GateDecision, RegisterService};
use crate::services::lock_branch;
use keystone_core::basket::{merge_lines, normalize_basket};
use keystone_core::pricing::{price_basket, settle_payment};
use keystone_core::validation::{validate_amount_received, validate_basket, validate_id};
use keystone_core::{
    BasketLine, Money, MovementType, Payment, PaymentMethod, PettyCashExpense, PricingPolicy,
    RawBasketLine, Sale, SaleLine, SaleReceipt, SaleStatus, StockLevels, AUTO_TRANSFER_REASON,
};

// =============================================================================
// Request
// =============================================================================

/// Everything needed to commit one sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub branch_id: String,
    pub operator_id: String,
    pub lines: Vec<BasketLine>,
    pub method: PaymentMethod,
    /// Cash tendered, or the amount charged by card / transfer.
    pub amount_received: Option<Money>,
    pub customer_id: Option<String>,
    /// Card authorization or transfer reference.
    pub reference: Option<String>,
    pub card_brand: Option<String>,
}

impl SaleRequest {
    pub fn new(
        branch_id: impl Into<String>,
        operator_id: impl Into<String>,
        lines: Vec<BasketLine>,
        method: PaymentMethod,
    ) -> Self {
        SaleRequest {
            branch_id: branch_id.into(),
            operator_id: operator_id.into(),
            lines,
            method,
            amount_received: None,
            customer_id: None,
            reference: None,
            card_brand: None,
        }
    }

    /// Builds a request from a loosely shaped basket (`qty`, string
    /// quantities, ...), normalizing it first.
    pub fn from_raw(
        branch_id: impl Into<String>,
        operator_id: impl Into<String>,
        raw: Vec<RawBasketLine>,
        method: PaymentMethod,
    ) -> PosResult<Self> {
        let lines = normalize_basket(raw)?;
        Ok(Self::new(branch_id, operator_id, lines, method))
    }

    pub fn amount_received(mut self, amount: Money) -> Self {
        self.amount_received = Some(amount);
        self
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn card_brand(mut self, brand: impl Into<String>) -> Self {
        self.card_brand = Some(brand.into());
        self
    }
}

// =============================================================================
// Service
// =============================================================================

/// Commits sales.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    register: RegisterService,
    pricing: PricingPolicy,
    events: SaleEvents,
    clock: Arc<dyn Clock>,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        register: RegisterService,
        pricing: PricingPolicy,
        events: SaleEvents,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CheckoutService {
            db,
            register,
            pricing,
            events,
            clock,
        }
    }

    pub fn events(&self) -> &SaleEvents {
        &self.events
    }

    /// Commits a sale, or changes nothing.
    ///
    /// The one exception: when the gate finds the session expired, the
    /// auto-close is committed before the sale is rejected.
    pub async fn commit_sale(&self, request: SaleRequest) -> PosResult<SaleReceipt> {
        let branch_id = request.branch_id.as_str();
        let operator_id = request.operator_id.as_str();

        validate_id("branch_id", branch_id)?;
        validate_id("operator_id", operator_id)?;
        if let Some(customer_id) = &request.customer_id {
            validate_id("customer_id", customer_id)?;
        }
        if let Some(amount) = request.amount_received {
            validate_amount_received(amount)?;
        }
        // Every line must be valid on its own, not only the merged sum.
        validate_basket(&request.lines)?;
        let lines = merge_lines(&request.lines);
        validate_basket(&lines)?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        // 1. Gate
        let session = match self.register.gate_in(&mut *tx, operator_id, branch_id, now).await? {
            GateDecision::Pass(session) => session,
            GateDecision::Reject { error, closed } => {
                if closed.is_some() {
                    tx.commit().await?;
                }
                return Err(error.into());
            }
        };

        // 2. Allocation
        let product_ids: Vec<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
        let products = require_products(&mut *tx, &product_ids).await?;
        let allocation = InventoryService::allocate_in(
            &mut *tx,
            branch_id,
            operator_id,
            &lines,
            AUTO_TRANSFER_REASON,
            now,
        )
        .await?;
        let front_id = allocation.locations.front.id.as_str();

        // 3-4. Pricing and settlement
        let priced = price_basket(&self.pricing, &lines, &products)?;
        let total = priced.totals.total;
        let settlement = settle_payment(request.method, total, request.amount_received)?;

        // 5. Sale, lines, payment
        let business_date = self.register.calendar().business_date(now);
        let receipt_number = next_receipt_number(&mut *tx, branch_id, business_date).await?;
        let sale_id = Uuid::new_v4().to_string();

        let sale = Sale {
            id: sale_id.clone(),
            receipt_number: receipt_number.clone(),
            branch_id: branch_id.to_string(),
            operator_id: operator_id.to_string(),
            customer_id: request.customer_id.clone(),
            status: SaleStatus::Pending,
            subtotal: priced.totals.subtotal,
            discount: priced.totals.discount,
            tax: priced.totals.tax,
            total,
            created_at: now,
            confirmed_at: None,
        };
        SaleRepository::insert_sale(&mut *tx, &sale).await?;

        for line in &priced.lines {
            let sale_line = SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                price_tier: line.price_tier,
                discount: line.discount,
                tax: line.tax,
                line_total: line.line_total,
                created_at: now,
            };
            SaleRepository::insert_line(&mut *tx, &sale_line).await?;
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            method: request.method,
            amount: total,
            tendered: settlement.tendered,
            change_given: settlement.change,
            reference: request.reference.clone(),
            card_brand: request.card_brand.clone(),
            created_at: now,
        };
        SaleRepository::insert_payment(&mut *tx, &payment).await?;

        // 6. Stock commit
        let out_reason = format!("Sale {}", receipt_number);
        for line in &priced.lines {
            let product_id = line.product_id.as_str();
            if !StockRepository::debit(&mut *tx, product_id, front_id, line.quantity, now).await? {
                let front = StockRepository::quantity_in(&mut *tx, product_id, front_id)
                    .await?
                    .unwrap_or_default();
                let level = StockLevels::new(front, Default::default());
                return Err(shortage_error(branch_id, product_id, line.quantity, level).into());
            }

            MovementRepository::insert(
                &mut *tx,
                NewMovement {
                    movement_type: MovementType::Out,
                    product_id,
                    from_location_id: Some(front_id),
                    to_location_id: None,
                    quantity: line.quantity,
                    operator_id,
                    reason: &out_reason,
                    unit_cost: None,
                },
                now,
            )
            .await?;
        }

        // 7. Confirm
        SaleRepository::confirm(&mut *tx, &sale_id, now).await?;

        // 8. Change handed back
        if settlement.change.is_positive() {
            let expense = PettyCashExpense {
                id: Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                operator_id: operator_id.to_string(),
                branch_id: branch_id.to_string(),
                sale_id: sale_id.clone(),
                amount: settlement.change,
                description: format!("Change for receipt {}", receipt_number),
                created_at: now,
            };
            PettyCashRepository::insert(&mut *tx, &expense).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            receipt_number = %receipt_number,
            branch_id,
            operator_id,
            total = %total,
            change = %settlement.change,
            lines = priced.lines.len(),
            transfers = allocation.transfers.len(),
            "Sale confirmed"
        );

        self.events.publish(SaleConfirmed {
            sale_id: sale_id.clone(),
            receipt_number: receipt_number.clone(),
            branch_id: branch_id.to_string(),
            operator_id: operator_id.to_string(),
            total,
            confirmed_at: now,
        });
        debug!(sale_id = %sale_id, "Sale commit finished");

        Ok(SaleReceipt {
            sale_id,
            receipt_number,
            total,
            change: settlement.change,
            transfers: allocation.transfers,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::test_support::{units, utc, Fixture};
    use keystone_core::basket::RawQuantity;
    use keystone_core::{
        CashGateReason, CloseReason, CoreError, PriceTier, Quantity, ValidationError,
        MAX_LINE_QUANTITY,
    };

    async fn open(fx: &Fixture) {
        fx.register()
            .open_session("op-1", &fx.branch_id, Money::from_cents(20_000))
            .await
            .unwrap();
    }

    fn sale(fx: &Fixture, lines: Vec<BasketLine>) -> SaleRequest {
        SaleRequest::new(&fx.branch_id, "op-1", lines, PaymentMethod::Cash)
    }

    #[tokio::test]
    async fn test_sale_pulls_shortfall_from_reserve() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(2)).await;
        fx.stock_reserve("p1", units(5)).await;
        open(&fx).await;

        let receipt = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(4))]))
            .await
            .unwrap();

        assert_eq!(receipt.transfers.len(), 1);
        assert_eq!(receipt.transfers[0].quantity, units(2));
        assert_eq!(receipt.transfers[0].reason, AUTO_TRANSFER_REASON);
        assert_eq!(fx.front_qty("p1").await, Quantity::zero());
        assert_eq!(fx.reserve_qty("p1").await, units(3));

        let stored = fx.db.sales().get_by_id(&receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Confirmed);
        assert_eq!(stored.confirmed_at, Some(fx.clock.now()));
        assert_eq!(stored.receipt_number, "20240301-0001");

        let movements = fx.db.movements().list_for_product("p1").await.unwrap();
        let outs: Vec<_> = movements
            .iter()
            .filter(|m| m.movement_type == MovementType::Out)
            .collect();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].quantity, units(4));
    }

    #[tokio::test]
    async fn test_shortage_rejects_sale_and_writes_nothing() {
        let fx = Fixture::new().await;
        fx.stock_reserve("p1", units(1)).await;
        open(&fx).await;
        let movements_before = fx.movement_count().await;

        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(3))]))
            .await
            .unwrap_err();

        match err.as_core() {
            Some(CoreError::InsufficientStock(e)) => {
                assert_eq!(e.shortages.len(), 1);
                assert_eq!(e.shortages[0].shortfall, units(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fx.movement_count().await, movements_before);
        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
        assert_eq!(fx.reserve_qty("p1").await, units(1));
    }

    #[tokio::test]
    async fn test_cash_change_is_recorded_as_petty_cash() {
        let fx = Fixture::new().await;
        // p1 sells for 10.00 with no tax
        fx.stock_front("p1", units(10)).await;
        open(&fx).await;

        let receipt = fx
            .checkout()
            .commit_sale(
                sale(&fx, vec![BasketLine::new("p1", units(10))])
                    .amount_received(Money::from_cents(15_000)),
            )
            .await
            .unwrap();

        assert_eq!(receipt.total, Money::from_cents(10_000));
        assert_eq!(receipt.change, Money::from_cents(5_000));

        let payment = fx.db.sales().get_payment(&receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(payment.amount, Money::from_cents(10_000));
        assert_eq!(payment.tendered, Money::from_cents(15_000));
        assert_eq!(payment.change_given, Money::from_cents(5_000));

        let session = fx.db.sessions().current("op-1", &fx.branch_id).await.unwrap().unwrap();
        let expenses = fx.db.petty_cash().list_for_session(&session.id).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount, Money::from_cents(5_000));
        assert_eq!(expenses[0].sale_id, receipt.sale_id);
    }

    #[tokio::test]
    async fn test_insufficient_cash_rolls_back_transfers() {
        let fx = Fixture::new().await;
        fx.stock_reserve("p1", units(5)).await;
        open(&fx).await;
        let movements_before = fx.movement_count().await;

        let err = fx
            .checkout()
            .commit_sale(
                sale(&fx, vec![BasketLine::new("p1", units(1))])
                    .amount_received(Money::from_cents(500)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_PAYMENT");
        // The allocation ran before settlement failed; none of it survives
        assert_eq!(fx.movement_count().await, movements_before);
        assert_eq!(fx.front_qty("p1").await, Quantity::zero());
        assert_eq!(fx.reserve_qty("p1").await, units(5));
        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_card_amount_must_match_total() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(1)).await;
        open(&fx).await;

        let mut request = sale(&fx, vec![BasketLine::new("p1", units(1))])
            .amount_received(Money::from_cents(999))
            .reference("AUTH-1");
        request.method = PaymentMethod::Card;

        let err = fx.checkout().commit_sale(request).await.unwrap_err();
        assert_eq!(err.code(), "PAYMENT_MISMATCH");
    }

    #[tokio::test]
    async fn test_wholesale_applies_at_threshold() {
        let fx = Fixture::new().await;
        // p1: 10.00 standard / 8.00 wholesale, p2: 5.00 standard only
        fx.stock_front("p1", units(20)).await;
        fx.stock_front("p2", units(20)).await;
        open(&fx).await;
        let checkout = fx.checkout();

        let below = checkout
            .commit_sale(sale(
                &fx,
                vec![BasketLine::new("p1", units(10)), BasketLine::new("p2", units(1))],
            ))
            .await
            .unwrap();
        let lines = fx.db.sales().get_lines(&below.sale_id).await.unwrap();
        assert!(lines.iter().all(|l| l.price_tier == PriceTier::Standard));
        assert_eq!(below.total, Money::from_cents(10_500));

        let at = checkout
            .commit_sale(sale(
                &fx,
                vec![BasketLine::new("p1", units(10)), BasketLine::new("p2", units(2))],
            ))
            .await
            .unwrap();
        let lines = fx.db.sales().get_lines(&at.sale_id).await.unwrap();
        let p1 = lines.iter().find(|l| l.product_id == "p1").unwrap();
        let p2 = lines.iter().find(|l| l.product_id == "p2").unwrap();
        assert_eq!(p1.price_tier, PriceTier::Wholesale);
        assert_eq!(p1.unit_price, Money::from_cents(800));
        // No wholesale price: stays standard
        assert_eq!(p2.price_tier, PriceTier::Standard);
        assert_eq!(at.total, Money::from_cents(9_000));
        assert_eq!(at.receipt_number, "20240301-0002");
    }

    #[tokio::test]
    async fn test_day_change_rejects_sale_and_persists_auto_close() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(5)).await;
        // Opened 08:00 local on day N (fixture calendar is UTC)
        fx.clock.set(utc("2024-03-01T08:00:00Z"));
        open(&fx).await;

        fx.clock.set(utc("2024-03-02T09:00:00Z"));
        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(1))]))
            .await
            .unwrap_err();

        let session_id = match err.as_core() {
            Some(CoreError::CashGate(gate)) => {
                assert_eq!(gate.reason, CashGateReason::DayChange);
                gate.session_id.clone().unwrap()
            }
            other => panic!("unexpected error: {:?}", other),
        };

        let session = fx.db.sessions().get_by_id(&session_id).await.unwrap().unwrap();
        assert_eq!(session.close_reason, Some(CloseReason::DayChange));
        assert_eq!(session.closed_at, Some(utc("2024-03-02T00:00:00Z")));
        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
        assert_eq!(fx.front_qty("p1").await, units(5));

        // The next attempt finds no session at all
        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(1))]))
            .await
            .unwrap_err();
        match err.as_core() {
            Some(CoreError::CashGate(gate)) => assert_eq!(gate.reason, CashGateReason::NoSession),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auto_close_totals_only_cover_the_session_window() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(10)).await;
        open(&fx).await;
        let checkout = fx.checkout();

        checkout
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(1))]))
            .await
            .unwrap();
        let mut card = sale(&fx, vec![BasketLine::new("p1", units(2))]);
        card.method = PaymentMethod::Card;
        checkout.commit_sale(card).await.unwrap();

        fx.clock.set(utc("2024-03-01T23:00:00Z"));
        let closed = fx.register().auto_close_due().await.unwrap();

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].cash_total, Money::from_cents(1_000));
        assert_eq!(closed[0].card_total, Money::from_cents(2_000));
        assert_eq!(closed[0].sale_count, 2);
        assert_eq!(closed[0].expected_cash, Some(Money::from_cents(21_000)));
    }

    #[tokio::test]
    async fn test_product_errors() {
        let fx = Fixture::new().await;
        fx.stock_front("archived", units(5)).await;
        open(&fx).await;

        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("ghost", units(1))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");

        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("archived", units(1))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRODUCT_UNAVAILABLE");
        assert_eq!(fx.front_qty("archived").await, units(5));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_write() {
        let fx = Fixture::new().await;
        open(&fx).await;

        let err = fx.checkout().commit_sale(sale(&fx, vec![])).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", Quantity::zero())]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn test_negative_line_cannot_offset_a_positive_one() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(10)).await;
        open(&fx).await;
        let movements = fx.movement_count().await;

        let err = fx
            .checkout()
            .commit_sale(sale(
                &fx,
                vec![BasketLine::new("p1", units(6)), BasketLine::new("p1", units(-5))],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
        assert_eq!(fx.front_qty("p1").await, units(10));
        assert_eq!(fx.movement_count().await, movements);
    }

    #[tokio::test]
    async fn test_oversized_duplicate_lines_are_rejected() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(10)).await;
        open(&fx).await;

        let err = fx
            .checkout()
            .commit_sale(sale(
                &fx,
                vec![
                    BasketLine::new("p1", Quantity::from_milli(i64::MAX)),
                    BasketLine::new("p1", Quantity::from_milli(1)),
                ],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::TooLarge { .. }))
        ));

        // Each line within the ceiling, the merged sum above it
        let err = fx
            .checkout()
            .commit_sale(sale(
                &fx,
                vec![
                    BasketLine::new("p1", MAX_LINE_QUANTITY),
                    BasketLine::new("p1", Quantity::from_milli(1)),
                ],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::TooLarge { .. }))
        ));
        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cutoff_rejects_sale_and_persists_auto_close() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(5)).await;
        open(&fx).await;
        let movements = fx.movement_count().await;

        // Fixture cutoff is 22:00 UTC
        fx.clock.set(utc("2024-03-01T22:15:00Z"));
        let err = fx
            .checkout()
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(1))]))
            .await
            .unwrap_err();

        let session_id = match err.as_core() {
            Some(CoreError::CashGate(gate)) => {
                assert_eq!(gate.reason, CashGateReason::Cutoff);
                gate.session_id.clone().unwrap()
            }
            other => panic!("unexpected error: {:?}", other),
        };

        let session = fx.db.sessions().get_by_id(&session_id).await.unwrap().unwrap();
        assert_eq!(session.close_reason, Some(CloseReason::Cutoff));
        assert_eq!(session.closed_at, Some(utc("2024-03-01T22:00:00Z")));
        assert_eq!(session.counted_cash, None);
        assert_eq!(session.variance, None);

        assert_eq!(fx.db.sales().count().await.unwrap(), 0);
        assert_eq!(fx.front_qty("p1").await, units(5));
        assert_eq!(fx.movement_count().await, movements);
    }

    #[tokio::test]
    async fn test_raw_basket_is_normalized() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(5)).await;
        open(&fx).await;

        let raw = vec![
            RawBasketLine {
                product_id: Some("p1".into()),
                quantity: Some(RawQuantity::Text("2".into())),
            },
            RawBasketLine {
                product_id: Some("p1".into()),
                quantity: Some(RawQuantity::Number(1.0)),
            },
        ];
        let request =
            SaleRequest::from_raw(&fx.branch_id, "op-1", raw, PaymentMethod::Cash).unwrap();

        let receipt = fx.checkout().commit_sale(request).await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(3_000));
        assert_eq!(fx.front_qty("p1").await, units(2));
    }

    #[tokio::test]
    async fn test_request_from_json() {
        let fx = Fixture::new().await;
        fx.stock_front("p2", units(4)).await;
        open(&fx).await;

        let json = serde_json::json!({
            "branch_id": fx.branch_id,
            "operator_id": "op-1",
            "lines": [{ "product_id": "p2", "quantity": 3000 }],
            "method": "CASH",
            "amount_received": 2000,
            "customer_id": null,
            "reference": null,
            "card_brand": null
        });
        let request: SaleRequest = serde_json::from_value(json).unwrap();

        let receipt = fx.checkout().commit_sale(request).await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(1_500));
        assert_eq!(receipt.change, Money::from_cents(500));
        assert_eq!(fx.front_qty("p2").await, units(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let fx = Fixture::with_config(DbConfig::new(dir.path().join("pos.db")).max_connections(8)).await;
        fx.stock_front("p1", units(3)).await;
        fx.stock_reserve("p1", units(2)).await;
        open(&fx).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let checkout = fx.checkout();
            let request = sale(&fx, vec![BasketLine::new("p1", units(1))]);
            handles.push(tokio::spawn(async move { checkout.commit_sale(request).await }));
        }

        let mut confirmed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(err) => assert_eq!(err.code(), "INSUFFICIENT_STOCK"),
            }
        }

        assert_eq!(confirmed, 5);
        assert_eq!(fx.front_qty("p1").await, Quantity::zero());
        assert_eq!(fx.reserve_qty("p1").await, Quantity::zero());
        assert_eq!(fx.db.sales().count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_confirmed_sale_is_published_after_commit() {
        let fx = Fixture::new().await;
        fx.stock_front("p1", units(5)).await;
        open(&fx).await;

        let checkout = fx.checkout();
        let mut rx = checkout.events().subscribe();

        let receipt = checkout
            .commit_sale(sale(&fx, vec![BasketLine::new("p1", units(1))]))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sale_id, receipt.sale_id);
        assert_eq!(event.total, receipt.total);

        let recent = fx
            .db
            .sales()
            .confirmed_since(&fx.branch_id, utc("2024-03-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }
}
