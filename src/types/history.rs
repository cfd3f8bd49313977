//! History archive types

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Typed confirmation literal required by every irreversible archive
/// operation. A checkbox in the front end is not enough; the operator has
/// to type this exact phrase.
pub const HISTORY_CONFIRM_PHRASE: &str = "ELIMINA STORICO";

/// A frozen copy of one completed work-order row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub id: i64,
    pub work_order_uid: String,
    pub work_order_number: i64,
    /// Creation timestamp of the original order, carried over on archival.
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub location_name: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub equipment: Option<String>,
    pub technician: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub total_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHistoryRequest {
    pub work_order_uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHistoryResponse {
    pub items: Vec<HistoryRow>,
    pub total: i64,
}

/// Admin deletion of selected archive rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteHistoryRowsRequest {
    pub row_ids: Vec<i64>,
    /// Must equal [`HISTORY_CONFIRM_PHRASE`].
    pub confirm: String,
}

/// Admin wipe of the whole archive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryRequest {
    /// Must equal [`HISTORY_CONFIRM_PHRASE`].
    pub confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDeletedResponse {
    pub deleted: i64,
}

/// One row of the `activity_report` view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReportRow {
    pub location_name: String,
    pub work_order_number: Option<i64>,
    pub technician: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub total_distance_km: Option<f64>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub brand: Option<String>,
    pub city: Option<String>,
    pub last_service: Option<NaiveDate>,
    pub next_service: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReportRequest {
    /// Case-insensitive substring match on the location name.
    pub location_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReportResponse {
    pub items: Vec<ActivityReportRow>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_request_carries_typed_phrase() {
        let json = r#"{"confirm": "ELIMINA STORICO"}"#;
        let req: ClearHistoryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.confirm, HISTORY_CONFIRM_PHRASE);
    }

    #[test]
    fn delete_rows_request_parses() {
        let json = r#"{"rowIds": [3, 5], "confirm": "nope"}"#;
        let req: DeleteHistoryRowsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.row_ids, vec![3, 5]);
        assert_ne!(req.confirm, HISTORY_CONFIRM_PHRASE);
    }
}
