//! Brand catalog queries

use anyhow::Result;
use sqlx::SqlitePool;

use crate::types::Brand;

/// Insert a brand. A duplicate name surfaces as a database error the
/// handler maps to a constraint-violation report.
pub async fn create_brand(pool: &SqlitePool, name: &str) -> std::result::Result<Brand, sqlx::Error> {
    let result = sqlx::query("INSERT INTO brands (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(Brand {
        id: result.last_insert_rowid(),
        name: name.to_string(),
    })
}

/// List brands alphabetically
pub async fn list_brands(pool: &SqlitePool) -> Result<Vec<Brand>> {
    let brands = sqlx::query_as::<_, Brand>("SELECT id, name FROM brands ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(brands)
}

/// Delete a brand by id
pub async fn delete_brand(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM brands WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{is_unique_violation, run_migrations};

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_list_delete() {
        let pool = test_pool().await;

        create_brand(&pool, "CONAD").await.unwrap();
        let carrefour = create_brand(&pool, "CARREFOUR MARKET").await.unwrap();

        let brands = list_brands(&pool).await.unwrap();
        assert_eq!(brands.len(), 2);
        assert_eq!(brands[0].name, "CARREFOUR MARKET");

        assert!(delete_brand(&pool, carrefour.id).await.unwrap());
        assert!(!delete_brand(&pool, carrefour.id).await.unwrap());
        assert_eq!(list_brands(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_a_unique_violation() {
        let pool = test_pool().await;

        create_brand(&pool, "CONAD").await.unwrap();
        let err = create_brand(&pool, "CONAD").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
