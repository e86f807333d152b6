//! # Pricing Module
//!
//! Resolves unit prices, computes line and sale totals, and settles payment.
//!
//! ## Wholesale Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total_units = Σ quantity over the WHOLE basket                         │
//! │                                                                         │
//! │  total_units ≥ threshold (default 12)?                                  │
//! │     yes → each line uses its product's wholesale price when > 0,       │
//! │           falling back to the standard price                           │
//! │     no  → standard price                                               │
//! │                                                                         │
//! │  No positive price on the chosen path → NoSellablePrice                 │
//! │  Inactive / archived product           → ProductUnavailable             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Math
//! ```text
//! gross      = unit_price × quantity          (rounded to the cent)
//! tax        = (gross − discount) × rate_bps   (exclusive, rounded)
//! line_total = gross − discount + tax
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::basket::{total_units, BasketLine};
use crate::error::{CoreError, CoreResult, PricingError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{PaymentMethod, PriceTier, Product};
use crate::WHOLESALE_THRESHOLD;

// =============================================================================
// Policy
// =============================================================================

/// Tunable pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Basket size from which wholesale prices apply.
    pub wholesale_threshold: Quantity,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            wholesale_threshold: WHOLESALE_THRESHOLD,
        }
    }
}

impl PricingPolicy {
    pub fn wholesale_applies(&self, lines: &[BasketLine]) -> bool {
        total_units(lines) >= self.wholesale_threshold
    }
}

// =============================================================================
// Priced Output
// =============================================================================

/// A basket line with its price resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub price_tier: PriceTier,
    pub discount: Money,
    pub tax: Money,
    pub line_total: Money,
}

/// Sale-level totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedBasket {
    pub lines: Vec<PricedLine>,
    pub totals: SaleTotals,
}

// =============================================================================
// Resolution
// =============================================================================

/// Picks the unit price for one product.
pub fn resolve_unit_price(
    product: &Product,
    wholesale_eligible: bool,
) -> Result<(Money, PriceTier), PricingError> {
    if !product.is_sellable() {
        return Err(PricingError::ProductUnavailable {
            product_id: product.id.clone(),
        });
    }

    if wholesale_eligible {
        if let Some(price) = product.wholesale_price.filter(Money::is_positive) {
            return Ok((price, PriceTier::Wholesale));
        }
    }

    if product.sale_price.is_positive() {
        Ok((product.sale_price, PriceTier::Standard))
    } else {
        Err(PricingError::NoSellablePrice {
            product_id: product.id.clone(),
        })
    }
}

/// Prices every line of a (merged) basket.
///
/// `products` must hold every product the basket references; a missing one
/// is reported as [`CoreError::ProductNotFound`].
pub fn price_basket(
    policy: &PricingPolicy,
    lines: &[BasketLine],
    products: &HashMap<String, Product>,
) -> CoreResult<PricedBasket> {
    let wholesale = policy.wholesale_applies(lines);
    let mut priced = Vec::with_capacity(lines.len());
    let mut totals = SaleTotals::default();

    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
        let (unit_price, price_tier) = resolve_unit_price(product, wholesale)?;

        let gross = unit_price.times(line.quantity);
        let discount = Money::zero();
        let tax = (gross - discount).tax_at_bps(product.tax_rate_bps);
        let line_total = gross - discount + tax;

        totals.subtotal += gross;
        totals.discount += discount;
        totals.tax += tax;
        totals.total += line_total;

        priced.push(PricedLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity: line.quantity,
            unit_price,
            price_tier,
            discount,
            tax,
            line_total,
        });
    }

    Ok(PricedBasket {
        lines: priced,
        totals,
    })
}

// =============================================================================
// Payment Settlement
// =============================================================================

/// What the customer handed over and what goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub tendered: Money,
    pub change: Money,
}

/// Applies the tender rules for `method`.
///
/// ## Rules
/// - Cash: `received` defaults to the total and must cover it
/// - Card / transfer: `received`, when given, must equal the total
///
/// ```rust
/// use keystone_core::pricing::settle_payment;
/// use keystone_core::{Money, PaymentMethod};
///
/// let s = settle_payment(PaymentMethod::Cash, Money::from_cents(10_000), Some(Money::from_cents(15_000))).unwrap();
/// assert_eq!(s.change, Money::from_cents(5_000));
/// ```
pub fn settle_payment(
    method: PaymentMethod,
    total: Money,
    received: Option<Money>,
) -> CoreResult<Settlement> {
    let tendered = received.unwrap_or(total);

    match method {
        PaymentMethod::Cash => {
            if tendered < total {
                return Err(CoreError::InsufficientPayment {
                    total,
                    received: tendered,
                });
            }
            Ok(Settlement {
                tendered,
                change: tendered - total,
            })
        }
        PaymentMethod::Card | PaymentMethod::Transfer => {
            if tendered != total {
                return Err(CoreError::PaymentMismatch {
                    method,
                    total,
                    received: tendered,
                });
            }
            Ok(Settlement {
                tendered,
                change: Money::zero(),
            })
        }
    }
}
