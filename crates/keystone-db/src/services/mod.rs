//! # Services
//!
//! The transactional operations of the POS core.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut tx = db.begin().await?;                                        │
//! │  lock_branch(&mut *tx, branch_id)    ← first statement, always a write  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reads + pure rules (keystone-core) + writes, all on &mut *tx           │
//! │       │                                                                 │
//! │       ├── any error → tx dropped → rollback, nothing persisted          │
//! │       ▼                                                                 │
//! │  tx.commit().await?                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  publish events / log the committed transition                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`inventory::InventoryService`] - Location resolution, allocation, transfers, receipts, counts
//! - [`register::RegisterService`] - Cash sessions and the gate before every sale
//! - [`checkout::CheckoutService`] - The sale commit protocol

pub mod checkout;
pub mod inventory;
pub mod register;

pub use checkout::{CheckoutService, SaleRequest};
pub use inventory::{Allocation, InventoryService};
pub use register::{GateDecision, RegisterService};

use sqlx::SqliteConnection;

use crate::error::PosResult;
use crate::repository::branch::BranchRepository;
use keystone_core::ConfigurationError;

/// Takes the branch write lock, failing for an unknown branch.
pub(crate) async fn lock_branch(conn: &mut SqliteConnection, branch_id: &str) -> PosResult<()> {
    if BranchRepository::lock(conn, branch_id).await? {
        Ok(())
    } else {
        Err(ConfigurationError::UnknownBranch {
            branch_id: branch_id.to_string(),
        }
        .into())
    }
}
