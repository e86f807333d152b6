//! # Branch Repository
//!
//! Branches, their locations, and the per-branch write lock.
//!
//! ## Branch Write Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every write transaction on a branch starts with                        │
//! │                                                                         │
//! │     UPDATE branches SET lock_version = lock_version + 1 WHERE id = ?    │
//! │                                                                         │
//! │  The first statement is a write, so SQLite hands the transaction the    │
//! │  database writer lock before it reads anything. Two sales on the same   │
//! │  branch run one after the other; the second sees the first's stock.     │
//! │                                                                         │
//! │  Zero rows updated means the branch does not exist.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use keystone_core::{Branch, Location, LocationRole};

/// Repository for branch and location operations.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    /// Creates a new BranchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// Creates a branch.
    pub async fn insert(&self, name: &str, now: DateTime<Utc>) -> DbResult<Branch> {
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now,
        };

        debug!(id = %branch.id, name = %branch.name, "Inserting branch");

        sqlx::query("INSERT INTO branches (id, name, lock_version, created_at) VALUES (?1, ?2, 0, ?3)")
            .bind(&branch.id)
            .bind(&branch.name)
            .bind(branch.created_at)
            .execute(&self.pool)
            .await?;

        Ok(branch)
    }

    /// Gets a branch by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, name, created_at FROM branches WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Adds a location to a branch.
    pub async fn insert_location(
        &self,
        branch_id: &str,
        name: &str,
        role: Option<LocationRole>,
        now: DateTime<Utc>,
    ) -> DbResult<Location> {
        let location = Location {
            id: Uuid::new_v4().to_string(),
            branch_id: branch_id.to_string(),
            name: name.to_string(),
            role,
            is_active: true,
        };

        debug!(id = %location.id, branch_id = %branch_id, name = %name, ?role, "Inserting location");

        sqlx::query(
            r#"
            INSERT INTO locations (id, branch_id, name, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(&location.id)
        .bind(&location.branch_id)
        .bind(&location.name)
        .bind(location.role)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(location)
    }

    /// Deactivates a location; it stops taking part in resolution.
    pub async fn deactivate_location(&self, location_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE locations SET is_active = 0 WHERE id = ?1")
            .bind(location_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All locations of a branch, active or not.
    pub async fn list_locations(&self, branch_id: &str) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, branch_id, name, role, is_active
            FROM locations
            WHERE branch_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    // =========================================================================
    // Transactional
    // =========================================================================

    /// Takes the branch write lock. Returns false if the branch is unknown.
    pub async fn lock(conn: &mut SqliteConnection, branch_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE branches SET lock_version = lock_version + 1 WHERE id = ?1")
            .bind(branch_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Locations of a branch, read inside the caller's transaction.
    pub async fn locations_in(
        conn: &mut SqliteConnection,
        branch_id: &str,
    ) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, branch_id, name, role, is_active
            FROM locations
            WHERE branch_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(branch_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(locations)
    }
}
