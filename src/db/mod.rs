//! Database module

pub mod queries;

use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Open (creating if missing) a SQLite database file.
pub async fn create_pool(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run the scheduling-database migrations.
///
/// Before running, synchronizes `_sqlx_migrations` with the compiled
/// migration list:
/// 1. Removes orphaned records (applied versions whose files no longer exist).
/// 2. Fixes checksum mismatches (CRLF/LF differences across platforms).
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running scheduling database migrations...");
    let migrator = sqlx::migrate!("./migrations");
    run_migrator(pool, &migrator).await?;
    info!("Scheduling database migrations complete");
    Ok(())
}

/// Run the login-audit-database migrations.
pub async fn run_login_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running login database migrations...");
    let migrator = sqlx::migrate!("./migrations_login");
    run_migrator(pool, &migrator).await?;
    info!("Login database migrations complete");
    Ok(())
}

async fn run_migrator(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> Result<()> {
    let compiled_versions: Vec<i64> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect();

    let applied_versions = get_applied_versions(pool).await?;

    remove_orphaned_migrations(pool, &compiled_versions, &applied_versions).await?;
    fix_migration_checksums(pool, migrator).await?;
    migrator.run(pool).await?;

    Ok(())
}

async fn get_applied_versions(pool: &SqlitePool) -> Result<Vec<i64>> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(vec![]);
    }

    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT version FROM _sqlx_migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Remove rows from `_sqlx_migrations` whose version is not present in
/// the compiled migrator. This handles files that were deleted or merged
/// into the initial schema after being applied.
async fn remove_orphaned_migrations(
    pool: &SqlitePool,
    compiled_versions: &[i64],
    applied_versions: &[i64],
) -> Result<()> {
    for &version in applied_versions {
        if !compiled_versions.contains(&version) {
            warn!(
                "Removing orphaned migration record: version {} (file no longer exists)",
                version
            );
            sqlx::query("DELETE FROM _sqlx_migrations WHERE version = ?")
                .bind(version)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Update stored checksums in `_sqlx_migrations` to match the checksums
/// embedded in the current binary. Handles CRLF/LF line-ending differences
/// across platforms.
async fn fix_migration_checksums(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !table_exists {
        return Ok(());
    }

    for migration in migrator.iter() {
        if migration.migration_type.is_down_migration() {
            continue;
        }

        let stored: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT checksum FROM _sqlx_migrations WHERE version = ?")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;

        if let Some((stored_checksum,)) = stored {
            let current_checksum: &[u8] = &migration.checksum;
            if stored_checksum != current_checksum {
                warn!(
                    "Migration {} ({}) checksum mismatch — updating stored checksum",
                    migration.version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = ? WHERE version = ?")
                    .bind(current_checksum)
                    .bind(migration.version)
                    .execute(pool)
                    .await?;
            }
        }
    }

    Ok(())
}

/// Whether an error is a UNIQUE-constraint violation (e.g. a duplicate
/// brand name), which is reported to the operator instead of crashing
/// the session.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
