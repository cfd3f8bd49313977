//! Backup/restore operation types

use serde::{Deserialize, Serialize};

/// Outcome of uploading (or skipping) one database file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFileResult {
    pub file: String,
    /// 'uploaded', 'unchanged', 'missing' or 'failed'
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRunResponse {
    pub files: Vec<BackupFileResult>,
    pub backed_up_at: String,
}

/// Outcome of restoring one database file (only ever written when the
/// local file is absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFileResult {
    pub file: String,
    /// 'restored', 'already-present', 'not-in-repository' or 'failed'
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRunResponse {
    pub files: Vec<RestoreFileResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatusResponse {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_at: Option<String>,
    pub files: Vec<BackupFileResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTestResponse {
    /// 'ok', 'branch-not-found', 'bad-credentials' or 'unexpected'
    pub status: String,
    pub message: String,
}
