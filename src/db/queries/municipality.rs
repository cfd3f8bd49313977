//! Municipality reference-data queries

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::types::Municipality;

const COLUMNS: &str = "name, code, postal_code, province, region, code2, lat, lon, extra";

/// List municipalities alphabetically, optionally filtered by name prefix
pub async fn list_municipalities(
    pool: &SqlitePool,
    search: Option<&str>,
) -> Result<Vec<Municipality>> {
    let rows = if let Some(search) = search {
        sqlx::query_as::<_, Municipality>(&format!(
            "SELECT {} FROM municipalities WHERE name LIKE ? || '%' COLLATE NOCASE ORDER BY name",
            COLUMNS
        ))
        .bind(search)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Municipality>(&format!(
            "SELECT {} FROM municipalities ORDER BY name",
            COLUMNS
        ))
        .fetch_all(pool)
        .await?
    };

    Ok(rows)
}

/// Exact-name lookup, used to prefill the address fields of a new location
pub async fn get_municipality(pool: &SqlitePool, name: &str) -> Result<Option<Municipality>> {
    let row = sqlx::query_as::<_, Municipality>(&format!(
        "SELECT {} FROM municipalities WHERE name = ?",
        COLUMNS
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Upsert municipalities from CSV content, keyed by name. Returns how many
/// rows were synced.
pub async fn import_csv(pool: &SqlitePool, csv_text: &str) -> Result<i64> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());

    let rows: Vec<Municipality> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("CSV column mismatch or bad value: {}", e))?;

    if rows.is_empty() {
        bail!("CSV contained no data rows");
    }

    let mut tx = pool.begin().await?;
    for row in &rows {
        sqlx::query(
            "INSERT INTO municipalities \
                (name, code, postal_code, province, region, code2, lat, lon, extra) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
                code = excluded.code, \
                postal_code = excluded.postal_code, \
                province = excluded.province, \
                region = excluded.region, \
                code2 = excluded.code2, \
                lat = excluded.lat, \
                lon = excluded.lon, \
                extra = excluded.extra",
        )
        .bind(&row.name)
        .bind(&row.code)
        .bind(&row.postal_code)
        .bind(&row.province)
        .bind(&row.region)
        .bind(&row.code2)
        .bind(row.lat)
        .bind(row.lon)
        .bind(&row.extra)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(rows.len() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    const CSV: &str = "\
name,code,postalCode,province,region,code2,lat,lon,extra
Milano,F205,20100,MI,Lombardia,015146,45.4642,9.19,
Pavia,G388,27100,PV,Lombardia,018110,45.1847,9.1582,
";

    #[tokio::test]
    async fn import_inserts_and_lists_alphabetically() {
        let pool = test_pool().await;

        let synced = import_csv(&pool, CSV).await.unwrap();
        assert_eq!(synced, 2);

        let all = list_municipalities(&pool, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Milano");
        assert_eq!(all[1].name, "Pavia");
    }

    #[tokio::test]
    async fn import_is_an_upsert_by_name() {
        let pool = test_pool().await;
        import_csv(&pool, CSV).await.unwrap();

        let updated = "\
name,code,postalCode,province,region,code2,lat,lon,extra
Milano,F205,20121,MI,Lombardia,015146,45.4642,9.19,
";
        import_csv(&pool, updated).await.unwrap();

        let all = list_municipalities(&pool, None).await.unwrap();
        assert_eq!(all.len(), 2, "re-import must not duplicate rows");
        let milano = get_municipality(&pool, "Milano").await.unwrap().unwrap();
        assert_eq!(milano.postal_code.as_deref(), Some("20121"));
    }

    #[tokio::test]
    async fn prefix_search_and_exact_lookup() {
        let pool = test_pool().await;
        import_csv(&pool, CSV).await.unwrap();

        let hits = list_municipalities(&pool, Some("mi")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Milano");

        assert!(get_municipality(&pool, "Pavia").await.unwrap().is_some());
        assert!(get_municipality(&pool, "Roma").await.unwrap().is_none());
    }
}
