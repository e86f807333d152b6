//! # Repository Module
//!
//! Database repository implementations for Keystone POS.
//!
//! ## Two Kinds of Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Access Patterns                           │
//! │                                                                         │
//! │  Reads and standalone writes          Work inside a transaction         │
//! │  ───────────────────────────          ──────────────────────────        │
//! │  db.sales().get_by_id(id)             let mut tx = db.begin().await?;  │
//! │  db.stock().levels(...)               BranchRepository::lock(&mut *tx, │
//! │       │                                                      branch)   │
//! │       │ &self.pool                    StockRepository::debit(&mut *tx, │
//! │       ▼                                                      ...)      │
//! │  any pooled connection                tx.commit().await?;              │
//! │                                            │                            │
//! │                                            │ &mut SqliteConnection      │
//! │                                            ▼                            │
//! │                                       the transaction's connection     │
//! │                                                                         │
//! │  Methods taking `&self` use the pool; associated functions taking      │
//! │  `conn: &mut SqliteConnection` run on the caller's transaction.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`branch::BranchRepository`] - Branches, locations, branch write lock
//! - [`product::ProductRepository`] - Catalog reads (and demo inserts)
//! - [`stock::StockRepository`] - Stock ledger entries
//! - [`movement::MovementRepository`] - Movement audit trail
//! - [`sale::SaleRepository`] - Sales, lines, payments
//! - [`receipt`] - Daily receipt number sequence
//! - [`session::SessionRepository`] - Cash-register sessions
//! - [`petty_cash::PettyCashRepository`] - Change-given expenses

pub mod branch;
pub mod movement;
pub mod petty_cash;
pub mod product;
pub mod receipt;
pub mod sale;
pub mod session;
pub mod stock;
