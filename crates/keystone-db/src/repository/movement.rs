//! # Movement Repository
//!
//! Append-only audit trail of stock changes.
//!
//! ```text
//!  IN        ──────────────────────► to_location
//!  OUT       from_location ─────────►
//!  TRANSFER  from_location ─────────► to_location
//!  ADJUST    from_location ─────────►              (count below ledger)
//!            ───────────────────────► to_location  (count above ledger)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use keystone_core::{Money, Movement, MovementType, Quantity};

const MOVEMENT_COLUMNS: &str = r#"
    id, movement_type, product_id, from_location_id, to_location_id,
    quantity, operator_id, reason, unit_cost, created_at
"#;

/// Fields of a movement before it gets an id.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub movement_type: MovementType,
    pub product_id: &'a str,
    pub from_location_id: Option<&'a str>,
    pub to_location_id: Option<&'a str>,
    pub quantity: Quantity,
    pub operator_id: &'a str,
    pub reason: &'a str,
    pub unit_cost: Option<Money>,
}

/// Repository for movement records.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Movements of a product, oldest first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "SELECT {} FROM movements WHERE product_id = ?1 ORDER BY created_at, rowid",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Number of movements of a type, for reconciliation checks.
    pub async fn count_by_type(&self, movement_type: MovementType) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movements WHERE movement_type = ?1")
            .bind(movement_type)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Appends a movement and returns the stored record.
    pub async fn insert(
        conn: &mut SqliteConnection,
        new: NewMovement<'_>,
        now: DateTime<Utc>,
    ) -> DbResult<Movement> {
        let movement = Movement {
            id: Uuid::new_v4().to_string(),
            movement_type: new.movement_type,
            product_id: new.product_id.to_string(),
            from_location_id: new.from_location_id.map(str::to_string),
            to_location_id: new.to_location_id.map(str::to_string),
            quantity: new.quantity,
            operator_id: new.operator_id.to_string(),
            reason: new.reason.to_string(),
            unit_cost: new.unit_cost,
            created_at: now,
        };

        debug!(
            id = %movement.id,
            movement_type = ?movement.movement_type,
            product_id = %movement.product_id,
            quantity = %movement.quantity,
            "Recording movement"
        );

        sqlx::query(
            r#"
            INSERT INTO movements (
                id, movement_type, product_id, from_location_id, to_location_id,
                quantity, operator_id, reason, unit_cost, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&movement.id)
        .bind(movement.movement_type)
        .bind(&movement.product_id)
        .bind(&movement.from_location_id)
        .bind(&movement.to_location_id)
        .bind(movement.quantity)
        .bind(&movement.operator_id)
        .bind(&movement.reason)
        .bind(movement.unit_cost)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(movement)
    }
}
