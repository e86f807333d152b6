//! # Receipt Numbers
//!
//! Per-branch, per-business-day counter.
//!
//! ```text
//!   20240301-0001, 20240301-0002, ...   (business date in the branch timezone)
//!   20240302-0001, ...                  (counter restarts each business day)
//! ```
//!
//! The counter row is bumped with an upsert inside the sale transaction, so
//! a rolled back sale gives its number back. `UNIQUE (branch_id,
//! receipt_number)` on `sales` is the final guard.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Reserves the next receipt number for `branch_id` on `business_date`.
pub async fn next_receipt_number(
    conn: &mut SqliteConnection,
    branch_id: &str,
    business_date: NaiveDate,
) -> DbResult<String> {
    let date_key = business_date.format("%Y-%m-%d").to_string();

    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO receipt_sequences (branch_id, business_date, last_number)
        VALUES (?1, ?2, 1)
        ON CONFLICT (branch_id, business_date)
        DO UPDATE SET last_number = last_number + 1
        RETURNING last_number
        "#,
    )
    .bind(branch_id)
    .bind(&date_key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_receipt_number(business_date, seq))
}

/// `YYYYMMDD-NNNN`; the sequence widens past 9999 rather than wrapping.
pub fn format_receipt_number(business_date: NaiveDate, seq: i64) -> String {
    format!("{}-{:04}", business_date.format("%Y%m%d"), seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_receipt_number() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(format_receipt_number(date, 1), "20240301-0001");
        assert_eq!(format_receipt_number(date, 12_345), "20240301-12345");
    }
}
