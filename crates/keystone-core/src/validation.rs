//! # Validation Module
//!
//! Input validation for Keystone POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Boundary (basket.rs)                                         │
//! │  ├── Loose shapes → BasketLine                                         │
//! │  └── Calls into THIS MODULE for quantity rules                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (keystone-db)                                       │
//! │  ├── THIS MODULE: ids, money amounts, reasons                          │
//! │  └── Runs before any transaction is opened                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── Partial UNIQUE index (one open session)                           │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use keystone_core::validation::{validate_id, validate_opening_float};
//! use keystone_core::Money;
//!
//! validate_id("branch_id", "b-downtown").unwrap();
//! assert!(validate_opening_float(Money::from_cents(-1)).is_err());
//! ```

use crate::basket::BasketLine;
use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::{MAX_BASKET_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity id (operator, branch, product, customer).
///
/// Ids come from external components, so only presence and length are
/// checked here; existence is checked against the store.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a free-text movement reason.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates one line's quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_line_quantity(field: &str, qty: Quantity) -> ValidationResult<()> {
    if !qty.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_LINE_QUANTITY.to_string(),
        });
    }

    Ok(())
}

/// Opening floats may be zero but never negative.
pub fn validate_opening_float(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "opening float".to_string(),
        });
    }

    Ok(())
}

/// Counted cash at close may be zero but never negative.
pub fn validate_counted_cash(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "counted cash".to_string(),
        });
    }

    Ok(())
}

/// Validates an amount the customer handed over.
pub fn validate_amount_received(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount received".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of distinct lines in a basket.
pub fn validate_basket_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "basket".to_string(),
        });
    }

    if lines > MAX_BASKET_LINES {
        return Err(ValidationError::TooLarge {
            field: "basket lines".to_string(),
            max: MAX_BASKET_LINES.to_string(),
        });
    }

    Ok(())
}

/// Validates an already-strict basket (callers that skip `RawBasketLine`).
pub fn validate_basket(lines: &[BasketLine]) -> ValidationResult<()> {
    validate_basket_size(lines.len())?;
    for line in lines {
        validate_id("product_id", &line.product_id)?;
        validate_line_quantity(&format!("quantity of {}", line.product_id), line.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("branch_id", "b-1").is_ok());
        assert!(validate_id("branch_id", "").is_err());
        assert!(validate_id("branch_id", "   ").is_err());
        assert!(validate_id("branch_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity("q", Quantity::from_milli(1)).is_ok());
        assert!(validate_line_quantity("q", MAX_LINE_QUANTITY).is_ok());

        assert!(validate_line_quantity("q", Quantity::zero()).is_err());
        assert!(validate_line_quantity("q", Quantity::from_units(-1)).is_err());
        assert!(validate_line_quantity("q", MAX_LINE_QUANTITY + Quantity::from_milli(1)).is_err());
    }

    #[test]
    fn test_money_validators() {
        assert!(validate_opening_float(Money::zero()).is_ok());
        assert!(validate_opening_float(Money::from_cents(-1)).is_err());
        assert!(validate_counted_cash(Money::zero()).is_ok());
        assert!(validate_amount_received(Money::zero()).is_err());
        assert!(validate_amount_received(Money::from_cents(1)).is_ok());
    }

    #[test]
    fn test_validate_basket() {
        let ok = vec![BasketLine::new("p", Quantity::from_units(1))];
        assert!(validate_basket(&ok).is_ok());
        assert!(validate_basket(&[]).is_err());

        let bad = vec![BasketLine::new("", Quantity::from_units(1))];
        assert!(validate_basket(&bad).is_err());

        let too_many: Vec<_> = (0..=MAX_BASKET_LINES)
            .map(|i| BasketLine::new(format!("p{}", i), Quantity::from_units(1)))
            .collect();
        assert!(matches!(
            validate_basket(&too_many),
            Err(ValidationError::TooLarge { .. })
        ));
    }
}
