//! Location database queries

use anyhow::{bail, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::types::{
    BulkSaveLocationsResponse, CreateLocationRequest, Location, LocationSnapshotRow,
};

const SELECT_COLUMNS: &str = "\
    id, name, address, postal_code, city, province, region, \
    last_service, next_service, equipment, notes, lat, lon, \
    code, brand, contact_name, contact_phone, geocode_status";

/// Editable columns, in bind order, shared by insert and diff-update.
const EDITABLE_COLUMNS: [&str; 16] = [
    "name",
    "address",
    "postal_code",
    "city",
    "province",
    "region",
    "last_service",
    "next_service",
    "equipment",
    "notes",
    "lat",
    "lon",
    "code",
    "brand",
    "contact_name",
    "contact_phone",
];

/// A single bindable column value, typed so the diff can compare fields
/// without losing their SQL affinity.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Real(Option<f64>),
    Date(Option<NaiveDate>),
}

impl ColumnValue {
    fn bind_to<'q>(
        self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            ColumnValue::Text(v) => query.bind(v),
            ColumnValue::Real(v) => query.bind(v),
            ColumnValue::Date(v) => query.bind(v),
        }
    }
}

fn snapshot_columns(row: &LocationSnapshotRow) -> Vec<(&'static str, ColumnValue)> {
    vec![
        ("name", ColumnValue::Text(Some(row.name.clone()))),
        ("address", ColumnValue::Text(Some(row.address.clone()))),
        ("postal_code", ColumnValue::Text(row.postal_code.clone())),
        ("city", ColumnValue::Text(Some(row.city.clone()))),
        ("province", ColumnValue::Text(row.province.clone())),
        ("region", ColumnValue::Text(row.region.clone())),
        ("last_service", ColumnValue::Date(row.last_service)),
        ("next_service", ColumnValue::Date(row.next_service)),
        ("equipment", ColumnValue::Text(row.equipment.clone())),
        ("notes", ColumnValue::Text(row.notes.clone())),
        ("lat", ColumnValue::Real(row.lat)),
        ("lon", ColumnValue::Real(row.lon)),
        ("code", ColumnValue::Text(row.code.clone())),
        ("brand", ColumnValue::Text(row.brand.clone())),
        ("contact_name", ColumnValue::Text(row.contact_name.clone())),
        ("contact_phone", ColumnValue::Text(row.contact_phone.clone())),
    ]
}

/// One planned UPDATE of the bulk save: only the columns whose value
/// actually changed.
#[derive(Debug)]
pub struct RowUpdate {
    pub id: i64,
    pub changes: Vec<(&'static str, ColumnValue)>,
}

/// The exact statement plan derived from an original/edited snapshot pair.
#[derive(Debug, Default)]
pub struct SnapshotDiff {
    pub deletes: Vec<i64>,
    pub inserts: Vec<LocationSnapshotRow>,
    pub updates: Vec<RowUpdate>,
}

/// Diff an edited snapshot against the original one.
///
/// - ids present in `original` but absent from `edited` → delete
/// - edited rows with a null id → insert
/// - ids present in both → field-by-field update of changed columns only
///   (two absent values compare as unchanged)
pub fn diff_snapshots(
    original: &[LocationSnapshotRow],
    edited: &[LocationSnapshotRow],
) -> SnapshotDiff {
    let edited_ids: Vec<i64> = edited.iter().filter_map(|r| r.id).collect();

    let deletes: Vec<i64> = original
        .iter()
        .filter_map(|r| r.id)
        .filter(|id| !edited_ids.contains(id))
        .collect();

    let inserts: Vec<LocationSnapshotRow> = edited
        .iter()
        .filter(|r| r.id.is_none())
        .cloned()
        .collect();

    let mut updates = Vec::new();
    for new_row in edited.iter().filter(|r| r.id.is_some()) {
        let id = new_row.id.unwrap();
        let Some(old_row) = original.iter().find(|r| r.id == Some(id)) else {
            // Edited row claims an id the original never had; ignore it,
            // matching the inner-join semantics of the legacy save.
            continue;
        };

        let changes: Vec<(&'static str, ColumnValue)> = snapshot_columns(new_row)
            .into_iter()
            .zip(snapshot_columns(old_row))
            .filter(|(new, old)| new.1 != old.1)
            .map(|(new, _)| new)
            .collect();

        if !changes.is_empty() {
            updates.push(RowUpdate { id, changes });
        }
    }

    SnapshotDiff {
        deletes,
        inserts,
        updates,
    }
}

/// List locations with an optional brand filter and name/city search
pub async fn list_locations(
    pool: &SqlitePool,
    brand: Option<&str>,
    search: Option<&str>,
) -> Result<Vec<Location>> {
    let mut sql = format!("SELECT {} FROM locations", SELECT_COLUMNS);
    let mut conditions = Vec::new();
    if brand.is_some() {
        conditions.push("brand = ?");
    }
    if search.is_some() {
        conditions.push("(name LIKE '%' || ? || '%' OR city LIKE '%' || ? || '%')");
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY id DESC");

    let mut query = sqlx::query_as::<_, Location>(&sql);
    if let Some(b) = brand {
        query = query.bind(b);
    }
    if let Some(s) = search {
        query = query.bind(s).bind(s);
    }

    Ok(query.fetch_all(pool).await?)
}

/// Get a location by id
pub async fn get_location(pool: &SqlitePool, id: i64) -> Result<Option<Location>> {
    let location = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

/// Get a location by display name (legacy lookup used when completing
/// an order; ambiguous when two locations share a name)
pub async fn get_location_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Location>> {
    let location = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE name = ? LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

fn insert_sql() -> String {
    format!(
        "INSERT INTO locations ({}, geocode_status) VALUES ({}, ?)",
        EDITABLE_COLUMNS.join(", "),
        vec!["?"; EDITABLE_COLUMNS.len()].join(", ")
    )
}

fn geocode_status_for(lat: Option<f64>, lon: Option<f64>) -> &'static str {
    if lat.is_some() && lon.is_some() {
        "success"
    } else {
        "pending"
    }
}

/// Create a location
pub async fn create_location(pool: &SqlitePool, req: &CreateLocationRequest) -> Result<Location> {
    let status = geocode_status_for(req.lat, req.lon);
    let result = sqlx::query(&insert_sql())
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.postal_code)
        .bind(&req.city)
        .bind(&req.province)
        .bind(&req.region)
        .bind(req.last_service)
        .bind(req.next_service)
        .bind(&req.equipment)
        .bind(&req.notes)
        .bind(req.lat)
        .bind(req.lon)
        .bind(&req.code)
        .bind(&req.brand)
        .bind(&req.contact_name)
        .bind(&req.contact_phone)
        .bind(status)
        .execute(pool)
        .await?;

    let id = result.last_insert_rowid();
    get_location(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("inserted location {} not found", id))
}

/// Update a location (full-row overwrite of the editable columns)
pub async fn update_location(
    pool: &SqlitePool,
    id: i64,
    req: &CreateLocationRequest,
) -> Result<Option<Location>> {
    let set_clause: Vec<String> = EDITABLE_COLUMNS.iter().map(|c| format!("{} = ?", c)).collect();
    let sql = format!(
        "UPDATE locations SET {}, geocode_status = ? WHERE id = ?",
        set_clause.join(", ")
    );

    let status = geocode_status_for(req.lat, req.lon);
    let result = sqlx::query(&sql)
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.postal_code)
        .bind(&req.city)
        .bind(&req.province)
        .bind(&req.region)
        .bind(req.last_service)
        .bind(req.next_service)
        .bind(&req.equipment)
        .bind(&req.notes)
        .bind(req.lat)
        .bind(req.lon)
        .bind(&req.code)
        .bind(&req.brand)
        .bind(&req.contact_name)
        .bind(&req.contact_phone)
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_location(pool, id).await
}

/// Delete locations by id; returns the number of rows removed
pub async fn delete_locations(pool: &SqlitePool, ids: &[i64]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    let sql = format!("DELETE FROM locations WHERE id IN ({})", placeholders);

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    Ok(query.execute(pool).await?.rows_affected() as i64)
}

/// Apply a snapshot diff in one transaction: exactly the derived deletes,
/// inserts and per-column updates, nothing else. Last write wins; there is
/// no version check against concurrent edits.
pub async fn bulk_save(
    pool: &SqlitePool,
    original: &[LocationSnapshotRow],
    edited: &[LocationSnapshotRow],
) -> Result<BulkSaveLocationsResponse> {
    let diff = diff_snapshots(original, edited);
    let mut outcome = BulkSaveLocationsResponse::default();

    let mut tx = pool.begin().await?;

    for id in &diff.deletes {
        sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        outcome.deleted += 1;
    }

    let insert = insert_sql();
    for row in &diff.inserts {
        let status = geocode_status_for(row.lat, row.lon);
        let mut query = sqlx::query(&insert);
        for (_, value) in snapshot_columns(row) {
            query = value.bind_to(query);
        }
        query.bind(status).execute(&mut *tx).await?;
        outcome.inserted += 1;
    }

    for update in diff.updates {
        let set_clause: Vec<String> = update
            .changes
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let sql = format!(
            "UPDATE locations SET {} WHERE id = ?",
            set_clause.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in update.changes {
            query = value.bind_to(query);
        }
        query.bind(update.id).execute(&mut *tx).await?;
        outcome.updated += 1;
    }

    tx.commit().await?;
    Ok(outcome)
}

/// Append location rows from CSV content. The header set must match the
/// snapshot columns exactly; nothing is written otherwise.
pub async fn import_csv(pool: &SqlitePool, csv_text: &str) -> Result<i64> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());

    let rows: Vec<LocationSnapshotRow> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("CSV column mismatch or bad value: {}", e))?;

    if rows.is_empty() {
        bail!("CSV contained no data rows");
    }

    let mut tx = pool.begin().await?;
    let insert = insert_sql();
    for row in &rows {
        let status = geocode_status_for(row.lat, row.lon);
        let mut query = sqlx::query(&insert);
        for (_, value) in snapshot_columns(row) {
            query = value.bind_to(query);
        }
        query.bind(status).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    Ok(rows.len() as i64)
}

/// Set coordinates found by geocoding and mark the location resolved
pub async fn set_coordinates(pool: &SqlitePool, id: i64, lat: f64, lon: f64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE locations SET lat = ?, lon = ?, geocode_status = 'success' WHERE id = ?",
    )
    .bind(lat)
    .bind(lon)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a location as failed geocoding, retaining it for manual retry
pub async fn mark_geocode_failed(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE locations SET geocode_status = 'failed' WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Locations still missing a coordinate component
pub async fn list_missing_coordinates(pool: &SqlitePool) -> Result<Vec<Location>> {
    let rows = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE lat IS NULL OR lon IS NULL ORDER BY id",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;

    fn snapshot(id: Option<i64>, name: &str, notes: Option<&str>) -> LocationSnapshotRow {
        LocationSnapshotRow {
            id,
            name: name.to_string(),
            address: "Via Roma 1".to_string(),
            postal_code: None,
            city: "Milano".to_string(),
            province: None,
            region: None,
            last_service: None,
            next_service: None,
            equipment: None,
            notes: notes.map(|s| s.to_string()),
            lat: None,
            lon: None,
            code: None,
            brand: None,
            contact_name: None,
            contact_phone: None,
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[test]
    fn diff_matches_expected_statement_plan() {
        // original {1:"A", 2:"B"}, edited {1:"A2", 3:"C"(new)} →
        // delete 2, update 1, insert C: exactly three operations.
        let original = vec![
            snapshot(Some(1), "A", None),
            snapshot(Some(2), "B", None),
        ];
        let edited = vec![
            snapshot(Some(1), "A2", None),
            snapshot(None, "C", None),
        ];

        let diff = diff_snapshots(&original, &edited);

        assert_eq!(diff.deletes, vec![2]);
        assert_eq!(diff.inserts.len(), 1);
        assert_eq!(diff.inserts[0].name, "C");
        assert_eq!(diff.updates.len(), 1);
        assert_eq!(diff.updates[0].id, 1);
        assert_eq!(diff.updates[0].changes.len(), 1);
        assert_eq!(diff.updates[0].changes[0].0, "name");
    }

    #[test]
    fn diff_treats_two_nulls_as_unchanged() {
        let original = vec![snapshot(Some(1), "A", None)];
        let edited = vec![snapshot(Some(1), "A", None)];

        let diff = diff_snapshots(&original, &edited);

        assert!(diff.deletes.is_empty());
        assert!(diff.inserts.is_empty());
        assert!(diff.updates.is_empty());
    }

    #[test]
    fn diff_detects_null_to_value_change() {
        let original = vec![snapshot(Some(1), "A", None)];
        let edited = vec![snapshot(Some(1), "A", Some("nuovo compressore"))];

        let diff = diff_snapshots(&original, &edited);

        assert_eq!(diff.updates.len(), 1);
        assert_eq!(diff.updates[0].changes.len(), 1);
        assert_eq!(diff.updates[0].changes[0].0, "notes");
    }

    #[test]
    fn diff_ignores_edited_rows_with_unknown_id() {
        let original = vec![snapshot(Some(1), "A", None)];
        let edited = vec![snapshot(Some(1), "A", None), snapshot(Some(99), "X", None)];

        let diff = diff_snapshots(&original, &edited);
        assert!(diff.updates.is_empty());
        assert!(diff.inserts.is_empty());
    }

    #[tokio::test]
    async fn bulk_save_applies_diff_atomically() {
        let pool = test_pool().await;

        let a = create_location(
            &pool,
            &CreateLocationRequest {
                name: "A".to_string(),
                address: "Via Roma 1".to_string(),
                postal_code: None,
                city: "Milano".to_string(),
                province: None,
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
        .unwrap();
        let b = create_location(
            &pool,
            &CreateLocationRequest {
                name: "B".to_string(),
                address: "Via Roma 2".to_string(),
                postal_code: None,
                city: "Milano".to_string(),
                province: None,
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
        .unwrap();

        let original = vec![
            snapshot(Some(a.id), "A", None),
            snapshot(Some(b.id), "B", None),
        ];
        let edited = vec![
            snapshot(Some(a.id), "A2", None),
            snapshot(None, "C", None),
        ];

        let outcome = bulk_save(&pool, &original, &edited).await.unwrap();
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 1);

        let all = list_locations(&pool, None, None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|l| l.name.as_str()).collect();
        assert!(names.contains(&"A2"));
        assert!(names.contains(&"C"));
        assert!(!names.contains(&"B"));
    }

    #[tokio::test]
    async fn import_csv_appends_rows() {
        let pool = test_pool().await;

        let csv = "\
id,name,address,postalCode,city,province,region,lastService,nextService,equipment,notes,lat,lon,code,brand,contactName,contactPhone
,PV Uno,Via Roma 1,20100,Milano,MI,Lombardia,,,,,45.46,9.19,,CONAD,,
,PV Due,Via Po 2,10100,Torino,TO,Piemonte,,,,,,,,CONAD,,
";
        let imported = import_csv(&pool, csv).await.unwrap();
        assert_eq!(imported, 2);

        let all = list_locations(&pool, Some("CONAD"), None).await.unwrap();
        assert_eq!(all.len(), 2);
        // Coordinates present → already resolved; absent → pending
        let uno = all.iter().find(|l| l.name == "PV Uno").unwrap();
        let due = all.iter().find(|l| l.name == "PV Due").unwrap();
        assert_eq!(uno.geocode_status, "success");
        assert_eq!(due.geocode_status, "pending");
    }

    #[tokio::test]
    async fn import_csv_rejects_wrong_columns_without_writing() {
        let pool = test_pool().await;

        let csv = "nome,indirizzo\nPV Uno,Via Roma 1\n";
        assert!(import_csv(&pool, csv).await.is_err());

        let all = list_locations(&pool, None, None).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn name_lookup_returns_one_row_even_when_names_collide() {
        let pool = test_pool().await;
        for city in ["Milano", "Pavia"] {
            create_location(
                &pool,
                &CreateLocationRequest {
                    name: "PV Duplicato".to_string(),
                    address: "Via Roma 1".to_string(),
                    postal_code: None,
                    city: city.to_string(),
                    province: None,
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
            .unwrap();
        }

        // Two locations share the display name; the legacy lookup quietly
        // picks one of them.
        let found = get_location_by_name(&pool, "PV Duplicato").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn geocode_status_transitions() {
        let pool = test_pool().await;
        let loc = create_location(
            &pool,
            &CreateLocationRequest {
                name: "PV".to_string(),
                address: "Via Roma 1".to_string(),
                postal_code: None,
                city: "Milano".to_string(),
                province: None,
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
        .unwrap();
        assert_eq!(loc.geocode_status, "pending");

        mark_geocode_failed(&pool, loc.id).await.unwrap();
        let failed = get_location(&pool, loc.id).await.unwrap().unwrap();
        assert_eq!(failed.geocode_status, "failed");
        assert!(failed.coordinates().is_none());

        set_coordinates(&pool, loc.id, 45.46, 9.19).await.unwrap();
        let resolved = get_location(&pool, loc.id).await.unwrap().unwrap();
        assert_eq!(resolved.geocode_status, "success");
        assert!(resolved.coordinates().is_some());
    }
}
