//! # Register Sweeper
//!
//! Periodically auto-closes cash sessions that crossed the daily cutoff
//! or a business-day boundary, so drawers are reconciled even when no
//! sale comes along to trip the gate.
//!
//! ## Usage
//! ```bash
//! # Uses keystone.toml from the platform config dir, or defaults
//! cargo run -p keystone-db --bin register-sweeper
//!
//! # Explicit config file, single pass
//! cargo run -p keystone-db --bin register-sweeper -- --config ./keystone.toml --once
//! ```
//!
//! ```text
//!   every sweep_interval_secs:
//!       RegisterService::auto_close_due()
//!            │
//!            ├── Ok(closed)  → log each closed session
//!            └── Err(e)      → log; retryable errors wait for the next tick
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use keystone_db::{init_tracing, Database, PosConfig, RegisterService, SystemClock};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--once" => once = true,
            "--help" | "-h" => {
                println!("Keystone POS Register Sweeper");
                println!();
                println!("Usage: register-sweeper [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("      --once           Run a single sweep and exit");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = PosConfig::load(config_path)?;
    let calendar = config.calendar()?;
    let db = Database::new(config.db_config()?).await?;
    let register = RegisterService::new(db.clone(), calendar, Arc::new(SystemClock));

    info!(
        timezone = %calendar.timezone,
        cutoff = %calendar.cutoff,
        interval_secs = config.register.sweep_interval_secs,
        "Register sweeper started"
    );

    let mut ticker = tokio::time::interval(config.sweep_interval());
    loop {
        ticker.tick().await;

        match register.auto_close_due().await {
            Ok(closed) => {
                for session in &closed {
                    info!(
                        session_id = %session.id,
                        operator_id = %session.operator_id,
                        branch_id = %session.branch_id,
                        reason = ?session.close_reason,
                        expected_cash = ?session.expected_cash,
                        "Session auto-closed by sweep"
                    );
                }
            }
            Err(e) if e.is_retryable() => warn!(error = %e, "Sweep failed, retrying next tick"),
            Err(e) => error!(error = %e, code = e.code(), "Sweep failed"),
        }

        if once {
            break;
        }
    }

    db.close().await;
    Ok(())
}
