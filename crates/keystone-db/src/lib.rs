//! # keystone-db: Persistence and Services for Keystone POS
//!
//! SQLite storage (sqlx) and the transactional operations built on the pure
//! rules of `keystone-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keystone POS Data Flow                           │
//! │                                                                         │
//! │  Caller (front end, API, register-sweeper)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   keystone-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐    │    │
//! │  │   │   Services    │   │  Repositories  │   │   Database    │    │    │
//! │  │   │               │   │                │   │   (pool.rs)   │    │    │
//! │  │   │ Checkout      │──►│ Stock, Sale,   │──►│ SqlitePool    │    │    │
//! │  │   │ Register      │   │ Session, ...   │   │ Transactions  │    │    │
//! │  │   │ Inventory     │   │                │   │ Migrations    │    │    │
//! │  │   └──────┬────────┘   └────────────────┘   └───────────────┘    │    │
//! │  │          │ pure rules                                           │    │
//! │  │          ▼                                                      │    │
//! │  │   keystone-core (allocation, pricing, calendar, validation)     │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Repository implementations
//! - [`services`] - Inventory, register, and checkout operations
//! - [`config`] - Layered configuration (file, environment)
//! - [`clock`] - Injectable source of "now"
//! - [`events`] - Sale-confirmed notifications
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keystone_db::{CheckoutService, Database, PosConfig, RegisterService, SaleEvents, SystemClock};
//!
//! let config = PosConfig::load(None)?;
//! let db = Database::new(config.db_config()?).await?;
//! let clock = Arc::new(SystemClock);
//!
//! let register = RegisterService::new(db.clone(), config.calendar()?, clock.clone());
//! let checkout = CheckoutService::new(db, register, config.pricing_policy(), SaleEvents::new(), clock);
//! let receipt = checkout.commit_sale(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod services;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PosConfig};
pub use error::{DbError, DbResult, PosError, PosResult};
pub use events::{SaleConfirmed, SaleEvents};
pub use pool::{Database, DbConfig};
pub use services::{CheckoutService, InventoryService, RegisterService, SaleRequest};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::session::SessionRepository;
pub use repository::stock::StockRepository;

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber for the binaries.
///
/// Default: INFO, DEBUG for keystone crates; override with `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keystone=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
