//! # Inventory Service
//!
//! Location resolution and the allocation engine, plus the stock ledger
//! entry points that are not part of a sale (receiving and counting).
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  requests (merged)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve front / reserve ──── ConfigurationError                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ensure entries (both locations, every product)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read levels ──► plan_allocation (pure) ──── InsufficientStockError     │
//! │       │                                       (full shortage list,      │
//! │       ▼                                        nothing written)         │
//! │  per planned transfer:                                                  │
//! │     debit reserve (guarded) → credit front → TRANSFER movement          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers own the transaction and have already taken the branch lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{DbError, PosResult};
use crate::pool::Database;
use crate::repository::branch::BranchRepository;
use crate::repository::movement::{MovementRepository, NewMovement};
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockRepository;
use crate::services::lock_branch;
use keystone_core::allocation::plan_allocation;
use keystone_core::basket::merge_lines;
use keystone_core::location::resolve_locations;
use keystone_core::validation::{validate_basket, validate_id, validate_reason};
use keystone_core::{
    BasketLine, BranchLocations, ConfigurationError, CoreError, InsufficientStockError, Location,
    Money, Movement, MovementType, Product, Quantity, Shortage, StockLevels, ValidationError,
};

/// Result of an allocation pass.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub locations: BranchLocations,
    /// TRANSFER movements written, reserve to front.
    pub transfers: Vec<Movement>,
}

/// Stock operations on a branch's front and reserve.
#[derive(Clone)]
pub struct InventoryService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        InventoryService { db, clock }
    }

    /// Resolves the front and reserve locations of a branch.
    pub async fn resolve_locations(&self, branch_id: &str) -> PosResult<BranchLocations> {
        validate_id("branch_id", branch_id)?;

        if self.db.branches().get_by_id(branch_id).await?.is_none() {
            return Err(ConfigurationError::UnknownBranch {
                branch_id: branch_id.to_string(),
            }
            .into());
        }

        let locations = self.db.branches().list_locations(branch_id).await?;
        Ok(resolve_locations(branch_id, &locations)?)
    }

    /// Front and reserve quantities of each product at a branch.
    pub async fn levels(
        &self,
        branch_id: &str,
        product_ids: &[&str],
    ) -> PosResult<HashMap<String, StockLevels>> {
        let locations = self.resolve_locations(branch_id).await?;
        let stock = self.db.stock();

        let mut levels = HashMap::with_capacity(product_ids.len());
        for product_id in product_ids {
            let front = stock.quantity(product_id, &locations.front.id).await?;
            let reserve = stock.quantity(product_id, &locations.reserve.id).await?;
            levels.insert(product_id.to_string(), StockLevels::new(front, reserve));
        }

        Ok(levels)
    }

    /// Makes the front hold at least the requested quantities, moving the
    /// shortfall from reserve. Returns the transfers written.
    pub async fn transfer(
        &self,
        branch_id: &str,
        operator_id: &str,
        items: &[BasketLine],
        reason: &str,
    ) -> PosResult<Vec<Movement>> {
        validate_id("branch_id", branch_id)?;
        validate_id("operator_id", operator_id)?;
        validate_reason(reason)?;
        validate_basket(items)?;
        let items = merge_lines(items);
        validate_basket(&items)?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        let product_ids: Vec<&str> = items.iter().map(|l| l.product_id.as_str()).collect();
        require_products(&mut *tx, &product_ids).await?;
        let allocation =
            Self::allocate_in(&mut *tx, branch_id, operator_id, &items, reason, now).await?;

        tx.commit().await?;

        info!(
            branch_id,
            operator_id,
            transfers = allocation.transfers.len(),
            "Transfer committed"
        );
        Ok(allocation.transfers)
    }

    /// Records goods arriving at a location of the branch (IN movement).
    #[allow(clippy::too_many_arguments)]
    pub async fn receive(
        &self,
        branch_id: &str,
        operator_id: &str,
        location_id: &str,
        product_id: &str,
        quantity: Quantity,
        unit_cost: Option<Money>,
        reason: &str,
    ) -> PosResult<Movement> {
        validate_id("operator_id", operator_id)?;
        validate_id("product_id", product_id)?;
        validate_reason(reason)?;
        if !quantity.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if unit_cost.is_some_and(|c| c.is_negative()) {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_cost".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        find_location(&mut *tx, branch_id, location_id).await?;
        require_products(&mut *tx, &[product_id]).await?;

        StockRepository::credit(&mut *tx, product_id, location_id, quantity, now).await?;
        let movement = MovementRepository::insert(
            &mut *tx,
            NewMovement {
                movement_type: MovementType::In,
                product_id,
                from_location_id: None,
                to_location_id: Some(location_id),
                quantity,
                operator_id,
                reason,
                unit_cost,
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(branch_id, location_id, product_id, %quantity, "Stock received");
        Ok(movement)
    }

    /// Sets a location's quantity to a physical count (ADJUST movement).
    ///
    /// Returns `None` when the count matches the ledger; no movement is
    /// written in that case.
    pub async fn adjust(
        &self,
        branch_id: &str,
        operator_id: &str,
        location_id: &str,
        product_id: &str,
        counted: Quantity,
        reason: &str,
    ) -> PosResult<Option<Movement>> {
        validate_id("operator_id", operator_id)?;
        validate_id("product_id", product_id)?;
        validate_reason(reason)?;
        if counted.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "counted".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        lock_branch(&mut *tx, branch_id).await?;

        find_location(&mut *tx, branch_id, location_id).await?;
        require_products(&mut *tx, &[product_id]).await?;

        StockRepository::ensure_entry(&mut *tx, product_id, location_id, now).await?;
        let current = StockRepository::quantity_in(&mut *tx, product_id, location_id)
            .await?
            .unwrap_or_default();

        if counted == current {
            debug!(product_id, location_id, %counted, "Count matches ledger");
            return Ok(None);
        }

        let (from, to, delta) = if counted < current {
            let delta = current - counted;
            if !StockRepository::debit(&mut *tx, product_id, location_id, delta, now).await? {
                return Err(DbError::Conflict(format!(
                    "stock of {} at {} changed during adjustment",
                    product_id, location_id
                ))
                .into());
            }
            (Some(location_id), None, delta)
        } else {
            let delta = counted - current;
            StockRepository::credit(&mut *tx, product_id, location_id, delta, now).await?;
            (None, Some(location_id), delta)
        };

        let movement = MovementRepository::insert(
            &mut *tx,
            NewMovement {
                movement_type: MovementType::Adjust,
                product_id,
                from_location_id: from,
                to_location_id: to,
                quantity: delta,
                operator_id,
                reason,
                unit_cost: None,
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(branch_id, location_id, product_id, %current, %counted, "Stock adjusted");
        Ok(Some(movement))
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Resolves the branch's locations inside the caller's transaction.
    pub async fn resolve_in(
        conn: &mut SqliteConnection,
        branch_id: &str,
    ) -> PosResult<BranchLocations> {
        let locations = BranchRepository::locations_in(conn, branch_id).await?;
        Ok(resolve_locations(branch_id, &locations)?)
    }

    /// Runs the allocation engine inside the caller's transaction.
    ///
    /// `requests` must be merged and every product must exist.
    pub async fn allocate_in(
        conn: &mut SqliteConnection,
        branch_id: &str,
        operator_id: &str,
        requests: &[BasketLine],
        reason: &str,
        now: DateTime<Utc>,
    ) -> PosResult<Allocation> {
        let locations = Self::resolve_in(conn, branch_id).await?;
        let front_id = locations.front.id.as_str();
        let reserve_id = locations.reserve.id.as_str();

        let product_ids: Vec<&str> = requests.iter().map(|r| r.product_id.as_str()).collect();
        for product_id in &product_ids {
            StockRepository::ensure_entry(conn, product_id, front_id, now).await?;
            StockRepository::ensure_entry(conn, product_id, reserve_id, now).await?;
        }

        let levels = StockRepository::levels_in(conn, front_id, reserve_id, &product_ids).await?;
        let plan = plan_allocation(branch_id, requests, &levels).map_err(|err| {
            warn!(
                branch_id,
                shortages = err.shortages.len(),
                "Allocation rejected: insufficient stock"
            );
            err
        })?;

        let mut transfers = Vec::with_capacity(plan.transfers.len());
        for planned in &plan.transfers {
            let product_id = planned.product_id.as_str();

            if !StockRepository::debit(conn, product_id, reserve_id, planned.quantity, now).await? {
                let level = levels.get(product_id).copied().unwrap_or_default();
                return Err(shortage_error(
                    branch_id,
                    product_id,
                    level.front + planned.quantity,
                    level,
                )
                .into());
            }
            StockRepository::credit(conn, product_id, front_id, planned.quantity, now).await?;

            let movement = MovementRepository::insert(
                conn,
                NewMovement {
                    movement_type: MovementType::Transfer,
                    product_id,
                    from_location_id: Some(reserve_id),
                    to_location_id: Some(front_id),
                    quantity: planned.quantity,
                    operator_id,
                    reason,
                    unit_cost: None,
                },
                now,
            )
            .await?;
            transfers.push(movement);
        }

        if !transfers.is_empty() {
            debug!(branch_id, transfers = transfers.len(), "Replenished front from reserve");
        }

        Ok(Allocation {
            locations,
            transfers,
        })
    }
}

/// Loads the given products, failing on the first unknown id.
pub(crate) async fn require_products(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> PosResult<HashMap<String, Product>> {
    let products = ProductRepository::fetch_many(conn, ids).await?;

    if let Some(missing) = ids.iter().find(|id| !products.contains_key(**id)) {
        return Err(CoreError::ProductNotFound(missing.to_string()).into());
    }

    Ok(products)
}

/// A single-product shortage, for guarded writes that lost a race.
pub(crate) fn shortage_error(
    branch_id: &str,
    product_id: &str,
    requested: Quantity,
    level: StockLevels,
) -> InsufficientStockError {
    InsufficientStockError {
        branch_id: branch_id.to_string(),
        shortages: vec![Shortage {
            product_id: product_id.to_string(),
            requested,
            front: level.front,
            reserve: level.reserve,
            shortfall: requested.saturating_sub(level.available()),
        }],
    }
}

async fn find_location(
    conn: &mut SqliteConnection,
    branch_id: &str,
    location_id: &str,
) -> PosResult<Location> {
    BranchRepository::locations_in(conn, branch_id)
        .await?
        .into_iter()
        .find(|l| l.id == location_id && l.is_active)
        .ok_or_else(|| DbError::not_found("Location", location_id).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
