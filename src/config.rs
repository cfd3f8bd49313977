//! Configuration management

use std::path::PathBuf;

use anyhow::Result;

/// Backup repository settings (source-hosting contents API)
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Repository in `owner/name` form
    pub repo: String,
    pub branch: String,
    pub token: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Path of the scheduling database file
    pub database_path: PathBuf,

    /// Path of the login-audit database file
    pub login_db_path: PathBuf,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Backup repository; backup operations report "not configured"
    /// when absent
    pub backup: Option<BackupConfig>,

    /// Path of the operator users file (JSON, argon2 hashes); login is
    /// rejected for everyone when absent
    pub users_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "manutenza.db".to_string())
            .into();

        let login_db_path = std::env::var("LOGIN_DB_PATH")
            .unwrap_or_else(|_| "login_log.db".to_string())
            .into();

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let backup = match (
            std::env::var("BACKUP_REPO"),
            std::env::var("BACKUP_TOKEN"),
        ) {
            (Ok(repo), Ok(token)) if !repo.is_empty() && !token.is_empty() => {
                let branch = std::env::var("BACKUP_BRANCH")
                    .unwrap_or_else(|_| "main".to_string());
                Some(BackupConfig { repo, branch, token })
            }
            _ => {
                tracing::info!("Backup repository not configured (BACKUP_REPO/BACKUP_TOKEN)");
                None
            }
        };

        let users_file = std::env::var("USERS_FILE").ok().map(PathBuf::from);

        Ok(Self {
            nats_url,
            database_path,
            login_db_path,
            nominatim_url,
            backup,
            users_file,
        })
    }
}
