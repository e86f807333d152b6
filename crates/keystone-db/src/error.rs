//! # Database Error Types
//!
//! Error types for database operations and the services built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)            CoreError (keystone-core)       │
//! │       │                                     │                           │
//! │       ▼                                     │                           │
//! │  DbError ← categorized (constraint,         │                           │
//! │            busy, pool, ...)                 │                           │
//! │       │                                     │                           │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │  PosError ← what service callers match on                               │
//! │       │     code()          stable machine code                         │
//! │       │     is_retryable()  infrastructure only                         │
//! │       ▼                                                                 │
//! │  Caller renders a message / retries                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use keystone_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and retry decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second open session for an operator (partial unique index)
    /// - Duplicate receipt number within a branch
    /// - Duplicate SKU when seeding
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing non-existent product_id or location_id
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A write would have driven a stock entry below zero
    /// - Non-positive movement quantity
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// The database was busy or locked by a concurrent writer.
    ///
    /// Safe to retry the whole operation.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Busy writers, dropped connections and an exhausted pool.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Conflict(_) | DbError::ConnectionFailed(_) | DbError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
///                               "database is locked/busy" → Conflict
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports constraints by message:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Conflict(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Error returned by the register, inventory and checkout services.
#[derive(Debug, Error)]
pub enum PosError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Settings could not be loaded or are invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PosError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PosError::Core(err) => err.code(),
            PosError::Db(DbError::Conflict(_)) => "CONFLICT",
            PosError::Db(DbError::NotFound { .. }) => "NOT_FOUND",
            PosError::Db(_) => "DATABASE",
            PosError::Config(_) => "CONFIG",
        }
    }

    /// True only for infrastructure failures; business rejections are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            PosError::Db(err) => err.is_retryable(),
            PosError::Core(_) | PosError::Config(_) => false,
        }
    }

    /// The business error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            PosError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<keystone_core::ValidationError> for PosError {
    fn from(err: keystone_core::ValidationError) -> Self {
        PosError::Core(CoreError::Validation(err))
    }
}

impl From<keystone_core::ConfigurationError> for PosError {
    fn from(err: keystone_core::ConfigurationError) -> Self {
        PosError::Core(CoreError::Configuration(err))
    }
}

impl From<keystone_core::InsufficientStockError> for PosError {
    fn from(err: keystone_core::InsufficientStockError) -> Self {
        PosError::Core(CoreError::InsufficientStock(err))
    }
}

impl From<keystone_core::CashGateError> for PosError {
    fn from(err: keystone_core::CashGateError) -> Self {
        PosError::Core(CoreError::CashGate(err))
    }
}

impl From<sqlx::Error> for PosError {
    fn from(err: sqlx::Error) -> Self {
        PosError::Db(err.into())
    }
}

/// Result type for service operations.
pub type PosResult<T> = Result<T, PosError>;

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{CashGateError, ValidationError};

    #[test]
    fn test_retryable_classification() {
        assert!(PosError::Db(DbError::Conflict("database is locked".into())).is_retryable());
        assert!(PosError::Db(DbError::PoolExhausted).is_retryable());
        assert!(!PosError::Db(DbError::CheckViolation { message: "x".into() }).is_retryable());

        let gate: PosError = CashGateError::no_session("op", "b").into();
        assert!(!gate.is_retryable());
        assert_eq!(gate.code(), "CASH_GATE");
    }

    #[test]
    fn test_validation_lifts_into_core() {
        let err: PosError = ValidationError::Required {
            field: "branch_id".into(),
        }
        .into();
        assert!(matches!(err.as_core(), Some(CoreError::Validation(_))));
        assert_eq!(err.code(), "VALIDATION");
    }
}
