//! # Error Types
//!
//! Domain-specific error types for keystone-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  keystone-core errors (this file)                                      │
//! │  ├── CoreError               - Every domain rejection                  │
//! │  │   ├── ConfigurationError  - Branch locations cannot be resolved     │
//! │  │   ├── CashGateError       - No usable register session              │
//! │  │   ├── InsufficientStockError - Shortages across the basket          │
//! │  │   ├── PricingError        - Product cannot be priced                │
//! │  │   └── ValidationError     - Malformed input                         │
//! │                                                                         │
//! │  keystone-db errors (separate crate)                                   │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── PosError         - What service callers see                       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PosError → Caller                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Detail payloads derive `Serialize` so a caller can render "front has 2,
//! reserve has 1, short by 2" without querying the ledger again.

use serde::Serialize;
use thiserror::Error;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{LocationRole, PaymentMethod};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the transactional core.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreError {
    /// Branch locations are misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The register gate refused the sale (or the open).
    #[error(transparent)]
    CashGate(#[from] CashGateError),

    /// One or more products cannot be covered by front + reserve.
    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStockError),

    /// A product in the basket cannot be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Explicit close with nothing open.
    #[error("No open register session for operator {operator_id} at branch {branch_id}")]
    NoOpenSession {
        operator_id: String,
        branch_id: String,
    },

    /// A second open for the same operator and branch.
    #[error("Operator {operator_id} already has session {session_id} open at branch {branch_id}")]
    SessionAlreadyOpen {
        session_id: String,
        operator_id: String,
        branch_id: String,
    },

    /// Cash received does not cover the total.
    #[error("Insufficient payment: total {total}, received {received}")]
    InsufficientPayment { total: Money, received: Money },

    /// Card and transfer payments settle the exact total.
    #[error("{method} payment must equal the total {total}, got {received}")]
    PaymentMismatch {
        method: PaymentMethod,
        total: Money,
        received: Money,
    },

    /// Product referenced by the basket does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),
}

impl CoreError {
    /// Stable machine-readable code, independent of the message wording.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Configuration(_) => "CONFIGURATION",
            CoreError::CashGate(_) => "CASH_GATE",
            CoreError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            CoreError::Pricing(PricingError::ProductUnavailable { .. }) => "PRODUCT_UNAVAILABLE",
            CoreError::Pricing(PricingError::NoSellablePrice { .. }) => "NO_SELLABLE_PRICE",
            CoreError::Validation(_) => "VALIDATION",
            CoreError::NoOpenSession { .. } => "NO_OPEN_SESSION",
            CoreError::SessionAlreadyOpen { .. } => "SESSION_ALREADY_OPEN",
            CoreError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            CoreError::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
        }
    }
}

// =============================================================================
// Configuration Error
// =============================================================================

/// The branch's location layout cannot support allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "problem", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationError {
    #[error("Branch {branch_id} does not exist")]
    UnknownBranch { branch_id: String },

    /// Neither a role flag nor a conventional name identifies the location.
    #[error("Branch {branch_id} has no {role} location")]
    MissingLocation { branch_id: String, role: LocationRole },

    /// Several active locations claim the same role.
    #[error("Branch {branch_id} has {} locations flagged {role}", .candidates.len())]
    AmbiguousLocation {
        branch_id: String,
        role: LocationRole,
        candidates: Vec<String>,
    },
}

// =============================================================================
// Cash Gate Error
// =============================================================================

/// Why the register gate refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashGateReason {
    /// No session is open for the operator at the branch.
    NoSession,
    /// The open session started on a previous business day.
    DayChange,
    /// Today's cutoff time has passed.
    Cutoff,
}

impl std::fmt::Display for CashGateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashGateReason::NoSession => write!(f, "NO_SESSION"),
            CashGateReason::DayChange => write!(f, "DAY_CHANGE"),
            CashGateReason::Cutoff => write!(f, "CUTOFF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Register closed for operator {operator_id} at branch {branch_id}: {reason}")]
pub struct CashGateError {
    pub reason: CashGateReason,
    pub operator_id: String,
    pub branch_id: String,
    /// The session that was auto-closed, for DAY_CHANGE and CUTOFF.
    pub session_id: Option<String>,
}

impl CashGateError {
    pub fn no_session(operator_id: &str, branch_id: &str) -> Self {
        CashGateError {
            reason: CashGateReason::NoSession,
            operator_id: operator_id.to_string(),
            branch_id: branch_id.to_string(),
            session_id: None,
        }
    }
}

// =============================================================================
// Insufficient Stock Error
// =============================================================================

/// Per-product shortage detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: String,
    pub requested: Quantity,
    /// Quantity on the front at evaluation time.
    pub front: Quantity,
    /// Quantity in reserve at evaluation time.
    pub reserve: Quantity,
    /// requested − front; more than the reserve holds.
    pub shortfall: Quantity,
}

/// Every product the basket cannot cover, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Insufficient stock at branch {branch_id}: {}", describe_shortages(.shortages))]
pub struct InsufficientStockError {
    pub branch_id: String,
    pub shortages: Vec<Shortage>,
}

fn describe_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(|s| {
            format!(
                "{} (requested {}, front {}, reserve {}, short {})",
                s.product_id, s.requested, s.front, s.reserve, s.shortfall
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Pricing Error
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "problem", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingError {
    /// Inactive or archived.
    #[error("Product {product_id} is not available for sale")]
    ProductUnavailable { product_id: String },

    /// Neither tier yields a positive price.
    #[error("Product {product_id} has no sellable price")]
    NoSellablePrice { product_id: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary before any transaction starts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Above a fixed ceiling (quantities, basket sizes).
    #[error("{field} cannot exceed {max}")]
    TooLarge { field: String, max: String },

    /// Invalid format (e.g., unparseable quantity).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shortage() -> Shortage {
        Shortage {
            product_id: "p-1".to_string(),
            requested: Quantity::from_units(3),
            front: Quantity::zero(),
            reserve: Quantity::from_units(1),
            shortfall: Quantity::from_units(3),
        }
    }

    #[test]
    fn test_insufficient_stock_message_lists_every_product() {
        let mut second = shortage();
        second.product_id = "p-2".to_string();
        let err = InsufficientStockError {
            branch_id: "b-1".to_string(),
            shortages: vec![shortage(), second],
        };
        let msg = err.to_string();
        assert!(msg.contains("p-1 (requested 3, front 0, reserve 1, short 3)"));
        assert!(msg.contains("p-2"));
    }

    #[test]
    fn test_cash_gate_message() {
        let err = CashGateError::no_session("op-1", "b-1");
        assert_eq!(
            err.to_string(),
            "Register closed for operator op-1 at branch b-1: NO_SESSION"
        );
    }

    #[test]
    fn test_codes_are_stable() {
        let err: CoreError = PricingError::NoSellablePrice {
            product_id: "p".to_string(),
        }
        .into();
        assert_eq!(err.code(), "NO_SELLABLE_PRICE");

        let err: CoreError = CashGateError::no_session("op", "b").into();
        assert_eq!(err.code(), "CASH_GATE");
    }

    #[test]
    fn test_details_serialize() {
        let err: CoreError = ConfigurationError::MissingLocation {
            branch_id: "b-1".to_string(),
            role: LocationRole::Reserve,
        }
        .into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "CONFIGURATION");
        assert_eq!(json["detail"]["problem"], "MISSING_LOCATION");
        assert_eq!(json["detail"]["role"], "reserve");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
