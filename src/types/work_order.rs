//! Work order types
//!
//! A work order is a batch of maintenance stops sharing one generated
//! `work_order_uid`, one sequential `work_order_number` and one total route
//! distance (deliberately duplicated onto every row for display).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted row of a work order (one stop)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderRow {
    pub id: i64,
    pub work_order_uid: String,
    pub work_order_number: i64,
    pub created_at: DateTime<Utc>,
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

/// One stop submitted at creation time.
///
/// `location_name`, `technician` and `scheduled_date` keys must be present
/// in the payload (a missing key aborts the whole request before any write);
/// `technician` and `scheduled_date` may still carry null *values*; they
/// stay editable on the active order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderStopInput {
    pub location_name: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub equipment: Option<String>,
    #[serde(deserialize_with = "explicit_key")]
    pub technician: Option<String>,
    #[serde(deserialize_with = "explicit_key")]
    pub scheduled_date: Option<NaiveDate>,
    /// Heterogeneous time-of-day value, normalized before persisting.
    #[serde(default)]
    pub scheduled_time: Option<serde_json::Value>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

/// Forces the key to be structurally present: serde's implicit
/// missing-key-is-None rule for `Option` fields is disabled by the
/// `deserialize_with` attribute, while an explicit null still parses.
fn explicit_key<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Option::deserialize(deserializer)
}

/// Request to create a work order from an ordered stop list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkOrderRequest {
    pub stops: Vec<WorkOrderStopInput>,
    /// Total route distance in km, computed over the stop order as given.
    pub total_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkOrderResponse {
    pub work_order_uid: String,
    pub work_order_number: i64,
    pub rows: i64,
}

/// Summary of one active order (one entry per `work_order_uid`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderSummary {
    pub work_order_uid: String,
    pub work_order_number: i64,
    pub created_at: DateTime<Utc>,
    pub stop_count: i64,
    pub total_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWorkOrdersResponse {
    pub items: Vec<WorkOrderSummary>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderUidRequest {
    pub work_order_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkOrderResponse {
    pub rows: Vec<WorkOrderRow>,
}

/// One row edit inside `workorder.update`. All mutable fields are
/// overwritten with the submitted values; an unparseable time persists
/// as null, never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderRowEdit {
    pub id: i64,
    pub technician: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<serde_json::Value>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkOrderRequest {
    pub work_order_uid: String,
    pub rows: Vec<WorkOrderRowEdit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkOrderResponse {
    pub updated: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorkOrderRowsRequest {
    pub work_order_uid: String,
    pub row_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRowsResponse {
    pub deleted: i64,
}

/// Result of completing an order: the archived rows and the locations
/// whose service data was refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteWorkOrderResponse {
    pub work_order_uid: String,
    pub archived_rows: i64,
    pub locations_updated: i64,
}

/// Request to compute the route distance over an ordered location sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDistanceRequest {
    /// Location ids in path order; the order is taken as given.
    pub location_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDistanceResponse {
    pub distance_km: f64,
    pub stops: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn stop_input_allows_null_values_for_structural_keys() {
        // technician key present with null value: fine
        let json = r#"{
            "locationName": "PV Milano Centro",
            "technician": null,
            "scheduledDate": null
        }"#;
        let stop: WorkOrderStopInput = serde_json::from_str(json).unwrap();
        assert!(stop.technician.is_none());
        assert!(stop.scheduled_date.is_none());
    }

    #[test]
    fn stop_input_rejects_missing_structural_keys() {
        // technician key absent entirely: the stop is rejected before
        // anything is written
        let json = r#"{
            "locationName": "PV Milano Centro",
            "scheduledDate": "2026-02-01"
        }"#;
        assert!(serde_json::from_str::<WorkOrderStopInput>(json).is_err());

        let json = r#"{
            "locationName": "PV Milano Centro",
            "technician": "Rossi"
        }"#;
        assert!(serde_json::from_str::<WorkOrderStopInput>(json).is_err());
    }

    #[test]
    fn create_request_parses_with_mixed_time_values() {
        let json = r#"{
            "stops": [
                {"locationName": "A", "technician": "Rossi", "scheduledDate": "2026-02-01", "scheduledTime": "09:00"},
                {"locationName": "B", "technician": "Rossi", "scheduledDate": "2026-02-01", "scheduledTime": 0.5}
            ],
            "totalDistanceKm": 13.6
        }"#;
        let req: CreateWorkOrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.stops.len(), 2);
        assert!(req.stops[0].scheduled_time.as_ref().unwrap().is_string());
        assert!(req.stops[1].scheduled_time.as_ref().unwrap().is_number());
    }

    #[test]
    fn uuid_string_round_trips_on_rows() {
        let uid = Uuid::new_v4().to_string();
        let req = WorkOrderUidRequest {
            work_order_uid: uid.clone(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: WorkOrderUidRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.work_order_uid, uid);
    }
}
