//! History archive queries
//!
//! The archive is append-only from the completion path; the only mutation
//! allowed here is irreversible admin deletion, gated by the typed
//! confirmation literal at the handler layer.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::types::{ActivityReportRow, HistoryRow};

const ROW_COLUMNS: &str = "\
    id, work_order_uid, work_order_number, created_at, completed_at, \
    location_name, address, postal_code, city, province, equipment, \
    technician, scheduled_date, scheduled_time, contact_name, \
    contact_phone, notes, total_distance_km";

/// List archive rows, optionally restricted to one order, newest order first
pub async fn list_history(pool: &SqlitePool, uid: Option<&str>) -> Result<Vec<HistoryRow>> {
    let rows = if let Some(uid) = uid {
        sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {} FROM history_orders WHERE work_order_uid = ? \
             ORDER BY work_order_number DESC, id",
            ROW_COLUMNS
        ))
        .bind(uid)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {} FROM history_orders ORDER BY work_order_number DESC, id",
            ROW_COLUMNS
        ))
        .fetch_all(pool)
        .await?
    };

    Ok(rows)
}

/// Delete selected archive rows; returns how many were removed
pub async fn delete_history_rows(pool: &SqlitePool, row_ids: &[i64]) -> Result<i64> {
    if row_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; row_ids.len()].join(",");
    let sql = format!("DELETE FROM history_orders WHERE id IN ({})", placeholders);

    let mut query = sqlx::query(&sql);
    for id in row_ids {
        query = query.bind(id);
    }

    Ok(query.execute(pool).await?.rows_affected() as i64)
}

/// Wipe the whole archive
pub async fn clear_history(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM history_orders").execute(pool).await?;
    Ok(result.rows_affected() as i64)
}

/// Read the reporting view with an optional location-name filter
pub async fn activity_report(
    pool: &SqlitePool,
    location_filter: Option<&str>,
) -> Result<Vec<ActivityReportRow>> {
    let rows = if let Some(filter) = location_filter {
        sqlx::query_as::<_, ActivityReportRow>(
            "SELECT * FROM activity_report \
             WHERE location_name LIKE '%' || ? || '%' COLLATE NOCASE \
             ORDER BY work_order_number DESC",
        )
        .bind(filter)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ActivityReportRow>(
            "SELECT * FROM activity_report ORDER BY work_order_number DESC",
        )
        .fetch_all(pool)
        .await?
    };

    Ok(rows)
}
