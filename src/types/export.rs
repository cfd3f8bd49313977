//! Export operation types

use serde::{Deserialize, Serialize};

/// A generated spreadsheet, returned inline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExportResponse {
    pub file_name: String,
    pub csv: String,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderDocumentRequest {
    pub work_order_uid: String,
    /// Render from the archive instead of the active store.
    #[serde(default)]
    pub from_history: bool,
}

/// The printable work order, paginated plain text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderDocumentResponse {
    pub file_name: String,
    pub document: String,
    pub pages: i64,
}

/// Zip bundle of the location and history spreadsheets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundleResponse {
    pub file_name: String,
    /// Base64-encoded zip archive.
    pub zip_base64: String,
}
