//! Login audit queries (login database file)

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::types::LoginLogEntry;

const COLUMNS: &str =
    "id, username, role, login_time, logout_time, session_duration_min, success";

/// Record a login attempt; role is only known on success
pub async fn record_attempt(
    pool: &SqlitePool,
    username: &str,
    role: Option<&str>,
    success: bool,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO login_log (username, role, login_time, success) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(role)
    .bind(Utc::now())
    .bind(success as i64)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Close the most recent open session of `username`: set the logout time
/// and the session duration in minutes. Returns the duration when a row
/// was closed.
pub async fn close_open_session(pool: &SqlitePool, username: &str) -> Result<Option<f64>> {
    let mut tx = pool.begin().await?;

    let open: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, login_time FROM login_log \
         WHERE username = ? AND success = 1 AND logout_time IS NULL \
         ORDER BY login_time DESC LIMIT 1",
    )
    .bind(username)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((id, login_time)) = open else {
        return Ok(None);
    };

    let logout_time = Utc::now();
    let duration_min = (logout_time - login_time).num_seconds() as f64 / 60.0;

    sqlx::query(
        "UPDATE login_log SET logout_time = ?, session_duration_min = ? WHERE id = ?",
    )
    .bind(logout_time)
    .bind(duration_min)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(duration_min))
}

/// Filterable audit listing, newest first
pub async fn list_log(
    pool: &SqlitePool,
    username: Option<&str>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> Result<Vec<LoginLogEntry>> {
    let mut sql = format!("SELECT {} FROM login_log", COLUMNS);
    let mut conditions = Vec::new();
    if username.is_some() {
        conditions.push("username = ?");
    }
    if date_from.is_some() {
        conditions.push("date(login_time) >= ?");
    }
    if date_to.is_some() {
        conditions.push("date(login_time) <= ?");
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY login_time DESC");

    let mut query = sqlx::query_as::<_, LoginLogEntry>(&sql);
    if let Some(u) = username {
        query = query.bind(u);
    }
    if let Some(d) = date_from {
        query = query.bind(d);
    }
    if let Some(d) = date_to {
        query = query.bind(d);
    }

    Ok(query.fetch_all(pool).await?)
}

/// Wipe the audit log (admin, confirmation-gated at the handler)
pub async fn clear_log(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM login_log").execute(pool).await?;
    Ok(result.rows_affected() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_login_migrations;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_login_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn attempts_are_recorded_with_success_flag() {
        let pool = test_pool().await;

        record_attempt(&pool, "mario", Some("admin"), true).await.unwrap();
        record_attempt(&pool, "intruso", None, false).await.unwrap();

        let all = list_log(&pool, None, None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let mario = list_log(&pool, Some("mario"), None, None).await.unwrap();
        assert_eq!(mario.len(), 1);
        assert_eq!(mario[0].success, 1);
        assert_eq!(mario[0].role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn logout_closes_latest_open_session() {
        let pool = test_pool().await;

        record_attempt(&pool, "mario", Some("admin"), true).await.unwrap();
        let duration = close_open_session(&pool, "mario").await.unwrap();
        assert!(duration.is_some());
        assert!(duration.unwrap() >= 0.0);

        // No open session left
        assert!(close_open_session(&pool, "mario").await.unwrap().is_none());

        let entries = list_log(&pool, Some("mario"), None, None).await.unwrap();
        assert!(entries[0].logout_time.is_some());
        assert!(entries[0].session_duration_min.is_some());
    }

    #[tokio::test]
    async fn failed_attempts_are_never_closed_as_sessions() {
        let pool = test_pool().await;

        record_attempt(&pool, "mario", None, false).await.unwrap();
        assert!(close_open_session(&pool, "mario").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn date_filter_bounds_results() {
        let pool = test_pool().await;
        record_attempt(&pool, "mario", Some("user"), true).await.unwrap();

        let today = Utc::now().date_naive();
        let hits = list_log(&pool, None, Some(today), Some(today)).await.unwrap();
        assert_eq!(hits.len(), 1);

        let tomorrow = today.succ_opt().unwrap();
        let none = list_log(&pool, None, Some(tomorrow), None).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let pool = test_pool().await;
        record_attempt(&pool, "mario", Some("user"), true).await.unwrap();
        record_attempt(&pool, "giulia", Some("admin"), true).await.unwrap();

        assert_eq!(clear_log(&pool).await.unwrap(), 2);
        assert!(list_log(&pool, None, None, None).await.unwrap().is_empty());
    }
}
