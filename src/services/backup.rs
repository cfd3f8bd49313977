//! Cloud backup of the database files through the source-hosting contents API.
//!
//! Both SQLite files are uploaded as base64 blobs, one commit per file. An
//! update must carry the blob key (`sha`) currently stored for that path,
//! otherwise the API answers with a conflict, so the key is fetched first.
//! A local sha256 digest of the last uploaded content lets an unchanged file
//! skip the round trip entirely. Restore is deliberately one-way: a file is
//! only ever written when it does not exist locally.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::BackupConfig;
use crate::types::{
    BackupFileResult, BackupRunResponse, BackupStatusResponse, BackupTestResponse,
    RestoreFileResult, RestoreRunResponse,
};

const TIMESTAMP_FILE: &str = "last_backup_time.txt";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("credentials rejected by the repository API")]
    BadCredentials,
    #[error("repository API answered {status}: {body}")]
    Api { status: u16, body: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

pub struct BackupService {
    repo: String,
    branch: String,
    token: String,
    api_base: String,
    /// Files covered by backup and restore, in upload order.
    files: Vec<PathBuf>,
    client: reqwest::Client,
}

impl BackupService {
    pub fn new(config: &BackupConfig, files: Vec<PathBuf>) -> Self {
        Self::with_api_base(config, files, "https://api.github.com")
    }

    pub fn with_api_base(config: &BackupConfig, files: Vec<PathBuf>, api_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Manutenza/1.0 (maintenance scheduling)")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone(),
            api_base: api_base.to_string(),
            files,
            client,
        }
    }

    fn contents_url(&self, name: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, name)
    }

    fn repo_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    fn digest_path(path: &Path) -> PathBuf {
        let mut p = path.as_os_str().to_owned();
        p.push(".digest");
        PathBuf::from(p)
    }

    /// Fetch the blob key currently stored for `name`, if the file exists
    /// in the repository.
    async fn remote_sha(&self, name: &str) -> Result<Option<String>, BackupError> {
        let url = format!("{}?ref={}", self.contents_url(name), self.branch);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let entry: ContentsEntry = response.json().await?;
                Ok(Some(entry.sha))
            }
            404 => Ok(None),
            401 | 403 => Err(BackupError::BadCredentials),
            status => Err(BackupError::Api {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Upload every configured file. Per-file failures are reported, never
    /// fatal to the batch.
    pub async fn run_backup(&self) -> BackupRunResponse {
        let mut results = Vec::with_capacity(self.files.len());

        for path in &self.files {
            results.push(self.backup_one(path).await);
        }

        let backed_up_at = Utc::now().to_rfc3339();
        if results.iter().any(|r| r.status == "uploaded") {
            if let Err(e) = std::fs::write(TIMESTAMP_FILE, &backed_up_at) {
                warn!("Failed to record backup timestamp: {}", e);
            }
        }

        BackupRunResponse {
            files: results,
            backed_up_at,
        }
    }

    async fn backup_one(&self, path: &Path) -> BackupFileResult {
        let name = Self::repo_name(path);

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not found locally, skipping backup", name);
                return BackupFileResult {
                    file: name,
                    status: "missing".to_string(),
                    digest: None,
                    message: Some("file not present locally".to_string()),
                };
            }
            Err(e) => {
                return BackupFileResult {
                    file: name,
                    status: "failed".to_string(),
                    digest: None,
                    message: Some(e.to_string()),
                };
            }
        };

        let digest = hex::encode(Sha256::digest(&bytes));

        let digest_file = Self::digest_path(path);
        if let Ok(previous) = std::fs::read_to_string(&digest_file) {
            if previous.trim() == digest {
                info!("{} unchanged since last backup, skipping", name);
                return BackupFileResult {
                    file: name,
                    status: "unchanged".to_string(),
                    digest: Some(digest),
                    message: None,
                };
            }
        }

        match self.upload(&name, &bytes).await {
            Ok(()) => {
                if let Err(e) = std::fs::write(&digest_file, &digest) {
                    warn!("Failed to record digest for {}: {}", name, e);
                }
                info!("{} backed up", name);
                BackupFileResult {
                    file: name,
                    status: "uploaded".to_string(),
                    digest: Some(digest),
                    message: None,
                }
            }
            Err(e) => BackupFileResult {
                file: name,
                status: "failed".to_string(),
                digest: Some(digest),
                message: Some(e.to_string()),
            },
        }
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<(), BackupError> {
        let sha = self.remote_sha(name).await?;

        let mut body = serde_json::json!({
            "message": format!("Backup {}", name),
            "content": BASE64.encode(bytes),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha);
        }

        let response = self
            .client
            .put(self.contents_url(name))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => Ok(()),
            401 | 403 => Err(BackupError::BadCredentials),
            status => Err(BackupError::Api {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Download every configured file that is absent locally. Files already
    /// on disk are never overwritten.
    pub async fn restore_missing(&self) -> RestoreRunResponse {
        let mut results = Vec::with_capacity(self.files.len());

        for path in &self.files {
            let name = Self::repo_name(path);

            if path.exists() {
                info!("{} already present locally, no download needed", name);
                results.push(RestoreFileResult {
                    file: name,
                    status: "already-present".to_string(),
                    message: None,
                });
                continue;
            }

            results.push(match self.download(&name, path).await {
                Ok(true) => {
                    info!("{} restored from the backup repository", name);
                    RestoreFileResult {
                        file: name,
                        status: "restored".to_string(),
                        message: None,
                    }
                }
                Ok(false) => RestoreFileResult {
                    file: name,
                    status: "not-in-repository".to_string(),
                    message: None,
                },
                Err(e) => RestoreFileResult {
                    file: name,
                    status: "failed".to_string(),
                    message: Some(e.to_string()),
                },
            });
        }

        RestoreRunResponse { files: results }
    }

    async fn download(&self, name: &str, target: &Path) -> Result<bool, BackupError> {
        let url = format!("{}?ref={}", self.contents_url(name), self.branch);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let entry: ContentsEntry = response.json().await?;
                match (entry.encoding.as_deref(), entry.content) {
                    (Some("base64"), Some(content)) => {
                        // The API wraps base64 content in newlines.
                        let compact: String =
                            content.chars().filter(|c| !c.is_whitespace()).collect();
                        let bytes = BASE64.decode(compact.as_bytes()).map_err(|e| {
                            BackupError::Api {
                                status: 200,
                                body: format!("invalid base64 payload: {}", e),
                            }
                        })?;
                        std::fs::write(target, bytes)?;
                        Ok(true)
                    }
                    (encoding, _) => Err(BackupError::Api {
                        status: 200,
                        body: format!("unsupported encoding {:?}", encoding),
                    }),
                }
            }
            404 => Ok(false),
            401 | 403 => Err(BackupError::BadCredentials),
            status => Err(BackupError::Api {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Probe the repository and branch without transferring data.
    pub async fn probe(&self) -> BackupTestResponse {
        let url = format!(
            "{}/repos/{}/branches/{}",
            self.api_base, self.repo, self.branch
        );

        let response = match self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return BackupTestResponse {
                    status: "unexpected".to_string(),
                    message: e.to_string(),
                }
            }
        };

        match response.status().as_u16() {
            200 => BackupTestResponse {
                status: "ok".to_string(),
                message: format!("branch '{}' found in '{}'", self.branch, self.repo),
            },
            404 => BackupTestResponse {
                status: "branch-not-found".to_string(),
                message: format!("branch '{}' or repository '{}' not found", self.branch, self.repo),
            },
            401 | 403 => BackupTestResponse {
                status: "bad-credentials".to_string(),
                message: "token rejected or lacking permissions".to_string(),
            },
            status => BackupTestResponse {
                status: "unexpected".to_string(),
                message: format!("unexpected answer {}", status),
            },
        }
    }

    /// Current backup state: last run timestamp plus each file's digest.
    pub fn status(&self) -> BackupStatusResponse {
        let last_backup_at = std::fs::read_to_string(TIMESTAMP_FILE)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| DateTime::parse_from_rfc3339(s).is_ok());

        let files = self
            .files
            .iter()
            .map(|path| {
                let name = Self::repo_name(path);
                match std::fs::read(path) {
                    Ok(bytes) => BackupFileResult {
                        file: name,
                        status: "present".to_string(),
                        digest: Some(hex::encode(Sha256::digest(&bytes))),
                        message: None,
                    },
                    Err(_) => BackupFileResult {
                        file: name,
                        status: "missing".to_string(),
                        digest: None,
                        message: None,
                    },
                }
            })
            .collect();

        BackupStatusResponse {
            configured: true,
            last_backup_at,
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackupConfig {
        BackupConfig {
            repo: "acme/manutenza-backup".to_string(),
            branch: "main".to_string(),
            token: "t0ken".to_string(),
        }
    }

    #[test]
    fn repo_name_strips_directories() {
        assert_eq!(
            BackupService::repo_name(Path::new("/var/data/manutenza.db")),
            "manutenza.db"
        );
    }

    #[test]
    fn digest_path_is_sibling() {
        let p = BackupService::digest_path(Path::new("manutenza.db"));
        assert_eq!(p, PathBuf::from("manutenza.db.digest"));
    }

    #[test]
    fn contents_url_shape() {
        let svc = BackupService::new(&config(), vec![]);
        assert_eq!(
            svc.contents_url("manutenza.db"),
            "https://api.github.com/repos/acme/manutenza-backup/contents/manutenza.db"
        );
    }

    #[tokio::test]
    async fn restore_skips_existing_files() {
        let dir = std::env::temp_dir().join("manutenza-restore-test");
        std::fs::create_dir_all(&dir).unwrap();
        let existing = dir.join("manutenza.db");
        std::fs::write(&existing, b"local data").unwrap();

        let svc = BackupService::new(&config(), vec![existing.clone()]);
        let result = svc.restore_missing().await;

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].status, "already-present");
        // Local content untouched
        assert_eq!(std::fs::read(&existing).unwrap(), b"local data");

        std::fs::remove_file(&existing).ok();
    }

    #[tokio::test]
    async fn backup_reports_missing_file_without_network() {
        let svc = BackupService::new(
            &config(),
            vec![PathBuf::from("/nonexistent/manutenza.db")],
        );
        let result = svc.run_backup().await;

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].status, "missing");
    }
}
