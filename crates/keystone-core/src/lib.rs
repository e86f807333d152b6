//! # keystone-core: Pure Business Logic for Keystone POS
//!
//! This crate holds every rule of the point-of-sale transactional core that
//! can be expressed without touching a database or a clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Keystone POS Architecture                         │
//! │                                                                         │
//! │  Callers (catalog, auth, UI, reporting) ── outside this workspace      │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    keystone-db (services)                       │   │
//! │  │   open/close session · commit sale · transfer · sweep           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls pure rules                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ keystone-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  basket ──► location ──► allocation ──► pricing ──► register   │   │
//! │  │  money · quantity · types · validation · error                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Location, StockEntry, Movement, Sale, ...)
//! - [`money`] - Integer-cent money
//! - [`quantity`] - Fixed-point stock quantities (thousandths of a unit)
//! - [`basket`] - Boundary normalization of loosely-shaped basket input
//! - [`location`] - Front/reserve location resolution
//! - [`allocation`] - Two-pass reserve → front transfer planning
//! - [`pricing`] - Wholesale threshold pricing and sale totals
//! - [`register`] - Business calendar and cash-session rules
//! - [`validation`] - Input validation
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use keystone_core::{Money, Quantity};
//!
//! let unit_price = Money::from_cents(1250);
//! let qty = Quantity::from_units(3);
//! assert_eq!(unit_price.times(qty).cents(), 3750);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod basket;
pub mod error;
pub mod location;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod register;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::{AllocationPlan, PlannedTransfer, StockLevels};
pub use basket::{BasketLine, RawBasketLine};
pub use error::{
    CashGateError, CashGateReason, ConfigurationError, CoreError, CoreResult,
    InsufficientStockError, PricingError, Shortage, ValidationError,
};
pub use location::BranchLocations;
pub use money::Money;
pub use pricing::{PricedBasket, PricedLine, PricingPolicy, SaleTotals, Settlement};
pub use quantity::Quantity;
pub use register::{BusinessCalendar, SessionClose, SessionState, SessionTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Basket size (in units, summed over every line) from which wholesale
/// prices apply.
pub const WHOLESALE_THRESHOLD: Quantity = Quantity::from_units(12);

/// Maximum distinct lines in a single basket.
pub const MAX_BASKET_LINES: usize = 200;

/// Maximum quantity of a single product in one basket.
///
/// Guards against keying mistakes (1000 instead of 10).
pub const MAX_LINE_QUANTITY: Quantity = Quantity::from_units(9_999);

/// Reason recorded on transfers generated by the allocation engine.
pub const AUTO_TRANSFER_REASON: &str = "Automatic replenishment from reserve for sale";
