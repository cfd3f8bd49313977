//! Manutenza Worker - Backend service for maintenance scheduling
//!
//! This worker connects to NATS and handles messages from the dispatcher
//! front end: location registry, work order lifecycle, geocoding, archive
//! reporting, exports and cloud backup of the database files.

mod auth;
mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::services::backup::BackupService;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,manutenza_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        Some(cli::Command::Migrate) => {
            let config = config::Config::from_env()?;
            let pool = db::create_pool(&config.database_path).await?;
            db::run_migrations(&pool).await?;
            let login_pool = db::create_pool(&config.login_db_path).await?;
            db::run_login_migrations(&login_pool).await?;
            info!("Migrations complete");
            return Ok(());
        }
        Some(cli::Command::Backup) => {
            let config = config::Config::from_env()?;
            let Some(service) = backup_service(&config) else {
                anyhow::bail!("Backup repository not configured (BACKUP_REPO/BACKUP_TOKEN)");
            };
            let outcome = service.run_backup().await;
            for file in &outcome.files {
                info!("{}: {}", file.file, file.status);
            }
            return Ok(());
        }
        Some(cli::Command::Restore) => {
            let config = config::Config::from_env()?;
            let Some(service) = backup_service(&config) else {
                anyhow::bail!("Backup repository not configured (BACKUP_REPO/BACKUP_TOKEN)");
            };
            let outcome = service.restore_missing().await;
            for file in &outcome.files {
                info!("{}: {}", file.file, file.status);
            }
            return Ok(());
        }
        Some(cli::Command::HashPassword { username, role }) => {
            let password = rpassword::prompt_password("Password: ")?;
            let hash = auth::hash_password(&password)?;
            let mut entry = serde_json::Map::new();
            entry.insert(
                username,
                serde_json::json!({ "passwordHash": hash, "role": role }),
            );
            println!("{}", serde_json::to_string_pretty(&entry)?);
            return Ok(());
        }
        Some(cli::Command::Serve) | None => {}
    }

    info!("Starting Manutenza Worker...");

    // Load configuration
    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    // Pull missing database files from the backup repository before opening
    // them; existing files are never overwritten.
    if let Some(service) = backup_service(&config) {
        let outcome = service.restore_missing().await;
        for file in &outcome.files {
            match file.status.as_str() {
                "restored" => info!("{} restored from backup", file.file),
                "failed" => warn!(
                    "{} restore failed: {}",
                    file.file,
                    file.message.as_deref().unwrap_or("unknown error")
                ),
                _ => {}
            }
        }
    }

    // Open databases
    let pool = db::create_pool(&config.database_path).await?;
    info!("Connected to {}", config.database_path.display());

    let login_pool = db::create_pool(&config.login_db_path).await?;
    info!("Connected to {}", config.login_db_path.display());

    // Run migrations
    db::run_migrations(&pool).await?;
    db::run_login_migrations(&login_pool).await?;
    info!("Database migrations complete");

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, pool, login_pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

fn backup_service(config: &config::Config) -> Option<BackupService> {
    config.backup.as_ref().map(|backup_config| {
        BackupService::new(
            backup_config,
            vec![config.database_path.clone(), config.login_db_path.clone()],
        )
    })
}
