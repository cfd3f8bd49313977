//! Work order database queries
//!
//! The active store owns all row mutation; once an order is archived it is
//! immutable except for the gated admin deletes in the history module.

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::types::{
    CompleteWorkOrderResponse, CreateWorkOrderResponse, WorkOrderRow, WorkOrderStopInput,
    WorkOrderSummary,
};

const ROW_COLUMNS: &str = "\
    id, work_order_uid, work_order_number, created_at, location_name, \
    address, postal_code, city, province, equipment, technician, \
    scheduled_date, scheduled_time, contact_name, contact_phone, notes, \
    total_distance_km";

/// Next sequential order number: current maximum across the active store
/// *and* the archive, plus one. Read and insert share the caller's
/// transaction; the read-then-write race under concurrent creation is
/// accepted (single-writer assumption).
async fn next_order_number(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(n) FROM (\
            SELECT work_order_number AS n FROM work_orders \
            UNION ALL \
            SELECT work_order_number FROM history_orders)",
    )
    .fetch_one(&mut **tx)
    .await?;

    Ok(max.unwrap_or(0) + 1)
}

/// Create a work order: one fresh uid, the next sequential number, one row
/// per stop, all inside a single transaction so a failure leaves nothing
/// behind.
pub async fn create_work_order(
    pool: &SqlitePool,
    stops: &[(WorkOrderStopInput, Option<NaiveTime>)],
    total_distance_km: f64,
) -> Result<CreateWorkOrderResponse> {
    let uid = Uuid::new_v4().to_string();
    let created_at = Utc::now();

    let mut tx = pool.begin().await?;
    let number = next_order_number(&mut tx).await?;

    for (stop, time) in stops {
        sqlx::query(
            "INSERT INTO work_orders (\
                work_order_uid, work_order_number, created_at, location_name, \
                address, postal_code, city, province, equipment, technician, \
                scheduled_date, scheduled_time, contact_name, contact_phone, \
                notes, total_distance_km) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uid)
        .bind(number)
        .bind(created_at)
        .bind(&stop.location_name)
        .bind(&stop.address)
        .bind(&stop.postal_code)
        .bind(&stop.city)
        .bind(&stop.province)
        .bind(&stop.equipment)
        .bind(&stop.technician)
        .bind(stop.scheduled_date)
        .bind(time)
        .bind(&stop.contact_name)
        .bind(&stop.contact_phone)
        .bind(&stop.notes)
        .bind(total_distance_km)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(CreateWorkOrderResponse {
        work_order_uid: uid,
        work_order_number: number,
        rows: stops.len() as i64,
    })
}

/// One summary per active order, newest number first
pub async fn list_work_orders(pool: &SqlitePool) -> Result<Vec<WorkOrderSummary>> {
    let summaries = sqlx::query_as::<_, WorkOrderSummary>(
        "SELECT work_order_uid, work_order_number, MIN(created_at) AS created_at, \
                COUNT(*) AS stop_count, MAX(total_distance_km) AS total_distance_km \
         FROM work_orders \
         GROUP BY work_order_uid, work_order_number \
         ORDER BY work_order_number DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(summaries)
}

/// All rows of one active order, in insertion order (the path order)
pub async fn get_work_order(pool: &SqlitePool, uid: &str) -> Result<Vec<WorkOrderRow>> {
    let rows = sqlx::query_as::<_, WorkOrderRow>(&format!(
        "SELECT {} FROM work_orders WHERE work_order_uid = ? ORDER BY id",
        ROW_COLUMNS
    ))
    .bind(uid)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the mutable fields of one row. The time has already been
/// normalized (or nulled) by the caller.
#[allow(clippy::too_many_arguments)]
pub async fn update_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    uid: &str,
    row_id: i64,
    technician: Option<&str>,
    scheduled_date: Option<NaiveDate>,
    scheduled_time: Option<NaiveTime>,
    contact_name: Option<&str>,
    contact_phone: Option<&str>,
    notes: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE work_orders \
         SET technician = ?, scheduled_date = ?, scheduled_time = ?, \
             contact_name = ?, contact_phone = ?, notes = ? \
         WHERE id = ? AND work_order_uid = ?",
    )
    .bind(technician)
    .bind(scheduled_date)
    .bind(scheduled_time)
    .bind(contact_name)
    .bind(contact_phone)
    .bind(notes)
    .bind(row_id)
    .bind(uid)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove specific rows of an active order; remaining rows keep their ids
pub async fn delete_rows(pool: &SqlitePool, uid: &str, row_ids: &[i64]) -> Result<i64> {
    if row_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; row_ids.len()].join(",");
    let sql = format!(
        "DELETE FROM work_orders WHERE work_order_uid = ? AND id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(uid);
    for id in row_ids {
        query = query.bind(id);
    }

    Ok(query.execute(pool).await?.rows_affected() as i64)
}

/// Remove every row of an active order
pub async fn delete_order(pool: &SqlitePool, uid: &str) -> Result<i64> {
    let result = sqlx::query("DELETE FROM work_orders WHERE work_order_uid = ?")
        .bind(uid)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() as i64)
}

/// Complete an order: propagate its data back onto the matching locations,
/// copy every row into the archive, then delete the active rows, all in
/// one transaction, so a crash can neither duplicate nor lose rows.
///
/// Returns `None` (no writes at all) when the order has no rows.
pub async fn complete_work_order(
    pool: &SqlitePool,
    uid: &str,
) -> Result<Option<CompleteWorkOrderResponse>> {
    let completed_at = Utc::now();

    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, WorkOrderRow>(&format!(
        "SELECT {} FROM work_orders WHERE work_order_uid = ? ORDER BY id",
        ROW_COLUMNS
    ))
    .bind(uid)
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    // Each stop's schedule and contact data flows back to its location.
    // The lookup is by display name; two locations sharing a name both
    // match (legacy behavior).
    let mut locations_updated = 0i64;
    for row in &rows {
        let mut sets: Vec<&str> = Vec::new();
        if row.scheduled_date.is_some() {
            sets.push("last_service = ?");
        }
        if row.contact_name.as_deref().is_some_and(|s| !s.is_empty()) {
            sets.push("contact_name = ?");
        }
        if row.contact_phone.as_deref().is_some_and(|s| !s.is_empty()) {
            sets.push("contact_phone = ?");
        }
        if row.notes.as_deref().is_some_and(|s| !s.is_empty()) {
            sets.push("notes = ?");
        }
        if sets.is_empty() {
            continue;
        }

        let sql = format!(
            "UPDATE locations SET {} WHERE name = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(date) = row.scheduled_date {
            query = query.bind(date);
        }
        if let Some(name) = row.contact_name.as_deref().filter(|s| !s.is_empty()) {
            query = query.bind(name);
        }
        if let Some(phone) = row.contact_phone.as_deref().filter(|s| !s.is_empty()) {
            query = query.bind(phone);
        }
        if let Some(notes) = row.notes.as_deref().filter(|s| !s.is_empty()) {
            query = query.bind(notes);
        }
        let result = query.bind(&row.location_name).execute(&mut *tx).await?;
        if result.rows_affected() > 0 {
            locations_updated += 1;
        }
    }

    // Verbatim copy into the archive, then removal from the active store.
    let archived = sqlx::query(
        "INSERT INTO history_orders (\
            work_order_uid, work_order_number, created_at, location_name, \
            address, postal_code, city, province, equipment, technician, \
            scheduled_date, scheduled_time, contact_name, contact_phone, \
            notes, total_distance_km, completed_at) \
         SELECT work_order_uid, work_order_number, created_at, location_name, \
                address, postal_code, city, province, equipment, technician, \
                scheduled_date, scheduled_time, contact_name, contact_phone, \
                notes, total_distance_km, ? \
         FROM work_orders WHERE work_order_uid = ?",
    )
    .bind(completed_at)
    .bind(uid)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM work_orders WHERE work_order_uid = ?")
        .bind(uid)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(CompleteWorkOrderResponse {
        work_order_uid: uid.to_string(),
        archived_rows: archived as i64,
        locations_updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use crate::types::CreateLocationRequest;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn stop(location: &str) -> (WorkOrderStopInput, Option<NaiveTime>) {
        (
            WorkOrderStopInput {
                location_name: location.to_string(),
                address: Some("Via Roma 1".to_string()),
                postal_code: Some("20100".to_string()),
                city: Some("Milano".to_string()),
                province: Some("MI".to_string()),
                equipment: Some("banco frigo".to_string()),
                technician: Some("Rossi".to_string()),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 2, 1),
                scheduled_time: None,
                contact_name: Some("Sig. Bianchi".to_string()),
                contact_phone: Some("02 1234567".to_string()),
                notes: Some("controllo impianto".to_string()),
            },
            NaiveTime::from_hms_opt(9, 0, 0),
        )
    }

    async fn seed_location(pool: &SqlitePool, name: &str) -> i64 {
        crate::db::queries::location::create_location(
            pool,
            &CreateLocationRequest {
                name: name.to_string(),
                address: "Via Roma 1".to_string(),
                postal_code: Some("20100".to_string()),
                city: "Milano".to_string(),
                province: Some("MI".to_string()),
                region: None,
                last_service: None,
                next_service: None,
                equipment: None,
                notes: None,
                lat: None,
                lon: None,
                code: None,
                brand: None,
                contact_name: None,
                contact_phone: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn create_assigns_shared_uid_and_number() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A"), stop("B")], 13.6)
            .await
            .unwrap();
        assert_eq!(created.rows, 2);
        assert_eq!(created.work_order_number, 1);

        let rows = get_work_order(&pool, &created.work_order_uid).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.work_order_uid == created.work_order_uid));
        assert!(rows.iter().all(|r| r.work_order_number == 1));
        assert!(rows.iter().all(|r| r.total_distance_km == Some(13.6)));
        assert_eq!(
            rows[0].scheduled_time,
            NaiveTime::from_hms_opt(9, 0, 0)
        );
    }

    #[tokio::test]
    async fn numbering_is_sequential() {
        let pool = test_pool().await;

        let first = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        let second = create_work_order(&pool, &[stop("B")], 0.0).await.unwrap();
        let third = create_work_order(&pool, &[stop("C")], 0.0).await.unwrap();

        assert_eq!(first.work_order_number, 1);
        assert_eq!(second.work_order_number, 2);
        assert_eq!(third.work_order_number, 3);
    }

    #[tokio::test]
    async fn numbering_stays_monotonic_after_archive() {
        let pool = test_pool().await;

        let first = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        complete_work_order(&pool, &first.work_order_uid)
            .await
            .unwrap()
            .unwrap();

        // Active store is empty now; the number must still advance.
        let second = create_work_order(&pool, &[stop("B")], 0.0).await.unwrap();
        assert_eq!(second.work_order_number, first.work_order_number + 1);
    }

    #[tokio::test]
    async fn complete_moves_all_rows_to_history() {
        let pool = test_pool().await;
        seed_location(&pool, "A").await;

        let created = create_work_order(&pool, &[stop("A"), stop("A")], 5.0)
            .await
            .unwrap();

        let outcome = complete_work_order(&pool, &created.work_order_uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.archived_rows, 2);

        let active = get_work_order(&pool, &created.work_order_uid).await.unwrap();
        assert!(active.is_empty());

        let archived: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM history_orders WHERE work_order_uid = ?",
        )
        .bind(&created.work_order_uid)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(archived, 2);
    }

    #[tokio::test]
    async fn complete_twice_is_not_found_and_never_duplicates() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();

        assert!(complete_work_order(&pool, &created.work_order_uid)
            .await
            .unwrap()
            .is_some());
        // Second call: nothing found, nothing written.
        assert!(complete_work_order(&pool, &created.work_order_uid)
            .await
            .unwrap()
            .is_none());

        let archived: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM history_orders WHERE work_order_uid = ?",
        )
        .bind(&created.work_order_uid)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(archived, 1);
    }

    #[tokio::test]
    async fn complete_unknown_uid_is_noop() {
        let pool = test_pool().await;
        assert!(complete_work_order(&pool, "no-such-uid")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn complete_propagates_schedule_onto_location_by_name() {
        let pool = test_pool().await;
        let location_id = seed_location(&pool, "A").await;

        let created = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        let outcome = complete_work_order(&pool, &created.work_order_uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.locations_updated, 1);

        let location = crate::db::queries::location::get_location(&pool, location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(location.last_service, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(location.contact_name.as_deref(), Some("Sig. Bianchi"));
        assert_eq!(location.contact_phone.as_deref(), Some("02 1234567"));
        assert_eq!(location.notes.as_deref(), Some("controllo impianto"));
    }

    #[tokio::test]
    async fn complete_carries_created_at_into_history() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        let active = get_work_order(&pool, &created.work_order_uid).await.unwrap();
        let original_created_at = active[0].created_at;

        complete_work_order(&pool, &created.work_order_uid)
            .await
            .unwrap()
            .unwrap();

        let carried: chrono::DateTime<Utc> = sqlx::query_scalar(
            "SELECT created_at FROM history_orders WHERE work_order_uid = ?",
        )
        .bind(&created.work_order_uid)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(carried, original_created_at);
    }

    #[tokio::test]
    async fn delete_rows_keeps_remaining_ids() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A"), stop("B"), stop("C")], 0.0)
            .await
            .unwrap();
        let rows = get_work_order(&pool, &created.work_order_uid).await.unwrap();

        let deleted = delete_rows(&pool, &created.work_order_uid, &[rows[1].id])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = get_work_order(&pool, &created.work_order_uid).await.unwrap();
        assert_eq!(remaining.len(), 2);
        // Surviving rows keep their ids; nothing is renumbered.
        assert_eq!(remaining[0].id, rows[0].id);
        assert_eq!(remaining[1].id, rows[2].id);
    }

    #[tokio::test]
    async fn delete_rows_is_scoped_to_the_order() {
        let pool = test_pool().await;

        let first = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        let second = create_work_order(&pool, &[stop("B")], 0.0).await.unwrap();
        let second_rows = get_work_order(&pool, &second.work_order_uid).await.unwrap();

        // Addressing another order's row through the wrong uid removes nothing.
        let deleted = delete_rows(&pool, &first.work_order_uid, &[second_rows[0].id])
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn delete_order_removes_every_row() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A"), stop("B")], 0.0)
            .await
            .unwrap();
        let deleted = delete_order(&pool, &created.work_order_uid).await.unwrap();
        assert_eq!(deleted, 2);

        let summaries = list_work_orders(&pool).await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn update_row_overwrites_mutable_fields() {
        let pool = test_pool().await;

        let created = create_work_order(&pool, &[stop("A")], 0.0).await.unwrap();
        let rows = get_work_order(&pool, &created.work_order_uid).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let updated = update_row(
            &mut tx,
            &created.work_order_uid,
            rows[0].id,
            Some("Verdi"),
            NaiveDate::from_ymd_opt(2026, 3, 15),
            None,
            None,
            None,
            Some("spostato"),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert!(updated);

        let rows = get_work_order(&pool, &created.work_order_uid).await.unwrap();
        assert_eq!(rows[0].technician.as_deref(), Some("Verdi"));
        assert_eq!(rows[0].scheduled_date, NaiveDate::from_ymd_opt(2026, 3, 15));
        // The cleared time really is cleared, not merged.
        assert_eq!(rows[0].scheduled_time, None);
        assert_eq!(rows[0].contact_name, None);
        assert_eq!(rows[0].notes.as_deref(), Some("spostato"));
    }

    #[tokio::test]
    async fn list_summarizes_one_entry_per_order() {
        let pool = test_pool().await;

        create_work_order(&pool, &[stop("A"), stop("B")], 10.0)
            .await
            .unwrap();
        create_work_order(&pool, &[stop("C")], 5.0).await.unwrap();

        let summaries = list_work_orders(&pool).await.unwrap();
        assert_eq!(summaries.len(), 2);
        // Newest number first
        assert_eq!(summaries[0].work_order_number, 2);
        assert_eq!(summaries[0].stop_count, 1);
        assert_eq!(summaries[1].work_order_number, 1);
        assert_eq!(summaries[1].stop_count, 2);
    }
}
