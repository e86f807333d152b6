//! # Domain Types
//!
//! Records shared by the pure rules and the database layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Branch ──1:N── Location (role: front | reserve | none)                │
//! │                    │                                                    │
//! │  Product ──1:N── StockEntry (product, location) ◄── Movement (audit)   │
//! │                                                                         │
//! │  CashSession (operator, branch)                                         │
//! │      │ gates                                                            │
//! │      ▼                                                                  │
//! │  Sale ──1:N── SaleLine          PettyCashExpense ── refs ──► Sale      │
//! │    └──1:1── Payment                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity uses a UUID v4 string `id`. Sales additionally carry a
//! human-readable `receipt_number` issued from a per-branch daily sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Catalog (read-only here)
// =============================================================================

/// A product as published by the catalog component.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    /// Standard sale price.
    pub sale_price: Money,
    /// Price applied when the basket reaches the wholesale threshold.
    pub wholesale_price: Option<Money>,
    /// Tax rate in basis points (825 = 8.25%), added on top of the price.
    pub tax_rate_bps: u32,
    pub is_active: bool,
    pub is_archived: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Active and not archived.
    pub fn is_sellable(&self) -> bool {
        self.is_active && !self.is_archived
    }
}

// =============================================================================
// Branches & Locations
// =============================================================================

/// A physical store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Role a location plays in allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LocationRole {
    /// Sellable display area; sales debit this location.
    Front,
    /// Back storage that replenishes the front.
    Reserve,
}

impl fmt::Display for LocationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationRole::Front => write!(f, "front"),
            LocationRole::Reserve => write!(f, "reserve"),
        }
    }
}

/// A storage or sale point within a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub branch_id: String,
    pub name: String,
    pub role: Option<LocationRole>,
    pub is_active: bool,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// On-hand quantity of a product at a location. Never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub product_id: String,
    pub location_id: String,
    pub quantity: Quantity,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Kind of stock change recorded by a [`Movement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MovementType {
    /// Goods received into a location.
    In,
    /// Goods leaving the branch (sales).
    Out,
    /// Reserve ↔ front (or any location pair) relocation.
    Transfer,
    /// Administrative correction after a count.
    Adjust,
}

/// Immutable audit record of one stock change.
///
/// `from_location_id` is set when stock leaves a location, `to_location_id`
/// when it arrives; a transfer sets both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Movement {
    pub id: String,
    pub movement_type: MovementType,
    pub product_id: String,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    /// Always positive; direction comes from the location fields.
    pub quantity: Quantity,
    pub operator_id: String,
    pub reason: String,
    pub unit_cost: Option<Money>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

/// Sale lifecycle. A sale is written `Pending` and flipped to `Confirmed`
/// by the stock commit in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SaleStatus {
    Pending,
    Confirmed,
}

/// Which price list a line was charged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PriceTier {
    Standard,
    Wholesale,
}

/// Tender type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "CASH"),
            PaymentMethod::Card => write!(f, "CARD"),
            PaymentMethod::Transfer => write!(f, "TRANSFER"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "transfer" | "bank_transfer" | "wire" => Ok(PaymentMethod::Transfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: vec!["CASH".to_string(), "CARD".to_string(), "TRANSFER".to_string()],
            }),
        }
    }
}

/// Sale header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub branch_id: String,
    pub operator_id: String,
    pub customer_id: Option<String>,
    pub status: SaleStatus,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// A line of a sale. SKU and name are frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub price_tier: PriceTier,
    pub discount: Money,
    pub tax: Money,
    /// quantity × unit_price − discount + tax
    pub line_total: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Payment towards a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    /// Portion applied to the sale (equals the sale total).
    pub amount: Money,
    /// What the customer handed over.
    pub tendered: Money,
    /// Cash returned; zero for card and transfer.
    pub change_given: Money,
    /// Card authorization code or transfer reference.
    pub reference: Option<String>,
    pub card_brand: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What `CommitSale` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub receipt_number: String,
    pub total: Money,
    pub change: Money,
    /// Reserve → front transfers performed for this sale.
    pub transfers: Vec<Movement>,
}

// =============================================================================
// Cash Register
// =============================================================================

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CloseReason {
    /// Operator closed the register.
    Manual,
    /// The business day rolled over while the session was open.
    DayChange,
    /// The daily cutoff time passed.
    Cutoff,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Manual => write!(f, "MANUAL"),
            CloseReason::DayChange => write!(f, "DAY_CHANGE"),
            CloseReason::Cutoff => write!(f, "CUTOFF"),
        }
    }
}

/// A cash-register session for one operator at one branch.
///
/// Totals are zero while open and written once, at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub operator_id: String,
    pub branch_id: String,
    pub opening_float: Money,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub cash_total: Money,
    pub card_total: Money,
    pub transfer_total: Money,
    pub sale_count: i64,
    /// Opening float plus net cash sales.
    pub expected_cash: Option<Money>,
    pub counted_cash: Option<Money>,
    /// counted − expected; only set by an explicit close with a count.
    pub variance: Option<Money>,
    pub close_reason: Option<CloseReason>,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// Change handed back during a cash sale, logged against the float.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PettyCashExpense {
    pub id: String,
    pub session_id: String,
    pub operator_id: String,
    pub branch_id: String,
    pub sale_id: String,
    pub amount: Money,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("Debit".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Transfer
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&CloseReason::DayChange).unwrap(),
            "\"DAY_CHANGE\""
        );
        assert_eq!(serde_json::to_string(&LocationRole::Reserve).unwrap(), "\"reserve\"");
        assert_eq!(serde_json::to_string(&MovementType::Transfer).unwrap(), "\"TRANSFER\"");
    }
}
