//! # Basket Module
//!
//! Turns loosely-shaped basket input into strict [`BasketLine`]s.
//!
//! ## Boundary Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Callers send baskets in whatever shape their UI produced:              │
//! │                                                                         │
//! │    {"product_id": "p1", "quantity": 2}                                  │
//! │    {"productId": "p1", "qty": "2.5"}                                    │
//! │    {"id": "p1", "cantidad": 1}                                          │
//! │                                                                         │
//! │           │  RawBasketLine (serde aliases, number-or-string)            │
//! │           ▼                                                             │
//! │  normalize_basket()                                                     │
//! │    • product id present and non-empty                                   │
//! │    • quantity parses, is positive, ≤ MAX_LINE_QUANTITY                  │
//! │    • duplicate products summed, first-seen order kept                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Vec<BasketLine>  ── the only shape the core accepts                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::quantity::Quantity;
use crate::validation::{validate_basket_size, validate_line_quantity, ValidationResult};

/// One product and the quantity wanted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BasketLine {
    pub product_id: String,
    pub quantity: Quantity,
}

impl BasketLine {
    pub fn new(product_id: impl Into<String>, quantity: Quantity) -> Self {
        BasketLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Quantity as callers send it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
}

/// A basket line before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBasketLine {
    #[serde(default, alias = "productId", alias = "id")]
    pub product_id: Option<String>,
    #[serde(default, alias = "qty", alias = "cantidad")]
    pub quantity: Option<RawQuantity>,
}

impl RawBasketLine {
    fn into_line(self, index: usize) -> ValidationResult<BasketLine> {
        let product_id = self
            .product_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ValidationError::Required {
                field: format!("basket[{}].product_id", index),
            })?;

        let field = format!("basket[{}].quantity", index);
        let quantity = match self.quantity {
            None => return Err(ValidationError::Required { field }),
            Some(RawQuantity::Number(n)) => Quantity::from_decimal(n),
            Some(RawQuantity::Text(s)) => Quantity::parse_decimal(&s),
        }
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: field.clone(),
            reason: "must be a number with at most 3 decimals".to_string(),
        })?;

        validate_line_quantity(&field, quantity)?;

        Ok(BasketLine {
            product_id,
            quantity,
        })
    }
}

/// Validates raw lines and merges duplicates.
///
/// ```rust
/// use keystone_core::basket::{normalize_basket, RawBasketLine};
///
/// let raw: Vec<RawBasketLine> = serde_json::from_str(
///     r#"[{"product_id": "p1", "qty": "2"}, {"productId": "p1", "cantidad": 1.5}]"#,
/// ).unwrap();
/// let lines = normalize_basket(raw).unwrap();
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].quantity.milli(), 3_500);
/// ```
pub fn normalize_basket(raw: Vec<RawBasketLine>) -> ValidationResult<Vec<BasketLine>> {
    let lines = raw
        .into_iter()
        .enumerate()
        .map(|(i, line)| line.into_line(i))
        .collect::<ValidationResult<Vec<_>>>()?;

    let merged = merge_lines(&lines);
    validate_basket_size(merged.len())?;
    for line in &merged {
        validate_line_quantity(&format!("quantity of {}", line.product_id), line.quantity)?;
    }
    Ok(merged)
}

/// Sums quantities of repeated products, keeping first-seen order.
///
/// Sums saturate instead of overflowing; validate the merged lines against
/// `MAX_LINE_QUANTITY` afterwards.
pub fn merge_lines(lines: &[BasketLine]) -> Vec<BasketLine> {
    let mut merged: Vec<BasketLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

/// Σ quantity over every line.
pub fn total_units(lines: &[BasketLine]) -> Quantity {
    lines.iter().map(|l| l.quantity).sum()
}
