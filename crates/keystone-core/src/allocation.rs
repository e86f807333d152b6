//! # Allocation Module
//!
//! Plans reserve → front transfers so the front can cover a basket.
//!
//! ## Two-Pass Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pass 1: CHECK (this module, pure)                                      │
//! │    for each product (duplicates summed):                                │
//! │      front ≥ requested          → nothing to move                       │
//! │      shortfall = requested − front                                      │
//! │      reserve ≥ shortfall        → plan TRANSFER of exactly shortfall    │
//! │      otherwise                  → record Shortage, keep going           │
//! │    any Shortage → InsufficientStockError with ALL of them               │
//! │                                                                         │
//! │  Pass 2: ACT (keystone-db, inside the caller's transaction)             │
//! │    write the planned transfers; nothing is written if pass 1 failed     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the shortfall moves. Reserve stock beyond it stays in reserve.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::basket::{merge_lines, BasketLine};
use crate::error::{InsufficientStockError, Shortage};
use crate::quantity::Quantity;

/// Current front and reserve quantities for one product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevels {
    pub front: Quantity,
    pub reserve: Quantity,
}

impl StockLevels {
    pub fn new(front: Quantity, reserve: Quantity) -> Self {
        StockLevels { front, reserve }
    }

    /// Everything the branch could sell.
    pub fn available(&self) -> Quantity {
        self.front + self.reserve
    }
}

/// A reserve → front move the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlannedTransfer {
    pub product_id: String,
    pub quantity: Quantity,
}

/// Outcome of a successful check pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationPlan {
    /// Merged requests, in first-seen order.
    pub requests: Vec<BasketLine>,
    /// Only products whose front falls short.
    pub transfers: Vec<PlannedTransfer>,
}

impl AllocationPlan {
    pub fn is_noop(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Evaluates every request against `levels`.
///
/// Products missing from `levels` have no stock entries yet and count as
/// zero in both locations.
///
/// ```rust
/// use std::collections::HashMap;
/// use keystone_core::allocation::{plan_allocation, StockLevels};
/// use keystone_core::basket::BasketLine;
/// use keystone_core::Quantity;
///
/// let mut levels = HashMap::new();
/// levels.insert("p".to_string(), StockLevels::new(Quantity::from_units(2), Quantity::from_units(5)));
///
/// let plan = plan_allocation("b", &[BasketLine::new("p", Quantity::from_units(4))], &levels).unwrap();
/// assert_eq!(plan.transfers[0].quantity, Quantity::from_units(2));
/// ```
pub fn plan_allocation(
    branch_id: &str,
    requests: &[BasketLine],
    levels: &HashMap<String, StockLevels>,
) -> Result<AllocationPlan, InsufficientStockError> {
    let requests = merge_lines(requests);
    let mut transfers = Vec::new();
    let mut shortages = Vec::new();

    for request in &requests {
        let level = levels.get(&request.product_id).copied().unwrap_or_default();
        if level.front >= request.quantity {
            continue;
        }

        let shortfall = request.quantity - level.front;
        if level.reserve < shortfall {
            shortages.push(Shortage {
                product_id: request.product_id.clone(),
                requested: request.quantity,
                front: level.front,
                reserve: level.reserve,
                shortfall,
            });
            continue;
        }

        transfers.push(PlannedTransfer {
            product_id: request.product_id.clone(),
            quantity: shortfall,
        });
    }

    if !shortages.is_empty() {
        return Err(InsufficientStockError {
            branch_id: branch_id.to_string(),
            shortages,
        });
    }

    Ok(AllocationPlan {
        requests,
        transfers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(entries: &[(&str, i64, i64)]) -> HashMap<String, StockLevels> {
        entries
            .iter()
            .map(|(id, front, reserve)| {
                (
                    id.to_string(),
                    StockLevels::new(Quantity::from_units(*front), Quantity::from_units(*reserve)),
                )
            })
            .collect()
    }

    fn line(id: &str, units: i64) -> BasketLine {
        BasketLine::new(id, Quantity::from_units(units))
    }

    #[test]
    fn test_front_sufficient_needs_no_transfer() {
        let plan = plan_allocation("b", &[line("p", 3)], &levels(&[("p", 3, 0)])).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_transfers_exactly_the_shortfall() {
        let plan = plan_allocation("b", &[line("p", 4)], &levels(&[("p", 2, 5)])).unwrap();
        assert_eq!(
            plan.transfers,
            vec![PlannedTransfer {
                product_id: "p".to_string(),
                quantity: Quantity::from_units(2),
            }]
        );
    }

    #[test]
    fn test_shortage_reports_levels() {
        let err = plan_allocation("b", &[line("p", 3)], &levels(&[("p", 0, 1)])).unwrap_err();
        assert_eq!(
            err.shortages,
            vec![Shortage {
                product_id: "p".to_string(),
                requested: Quantity::from_units(3),
                front: Quantity::zero(),
                reserve: Quantity::from_units(1),
                shortfall: Quantity::from_units(3),
            }]
        );
    }

    #[test]
    fn test_collects_every_shortage_and_plans_nothing() {
        let err = plan_allocation(
            "b",
            &[line("a", 5), line("ok", 1), line("c", 2)],
            &levels(&[("a", 1, 1), ("ok", 0, 10)]),
        )
        .unwrap_err();
        let ids: Vec<_> = err.shortages.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_duplicates_are_summed_before_checking() {
        // 2 + 2 = 4 against front 3: one unit must come from reserve
        let plan =
            plan_allocation("b", &[line("p", 2), line("p", 2)], &levels(&[("p", 3, 1)])).unwrap();
        assert_eq!(plan.requests, vec![line("p", 4)]);
        assert_eq!(plan.transfers[0].quantity, Quantity::from_units(1));
    }

    #[test]
    fn test_fractional_quantities_compare_exactly() {
        let mut map = HashMap::new();
        map.insert(
            "p".to_string(),
            StockLevels::new(Quantity::from_milli(2_300), Quantity::zero()),
        );
        let plan =
            plan_allocation("b", &[BasketLine::new("p", Quantity::from_milli(2_300))], &map).unwrap();
        assert!(plan.is_noop());
    }
}
