//! Geocoding operation types

use serde::{Deserialize, Serialize};

use crate::types::Location;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGeocodeResponse {
    pub items: Vec<Location>,
    pub total: i64,
}

/// Request to geocode specific locations. Re-running after the operator
/// edits an address is the manual-retry path for failed items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGeocodeRequest {
    pub location_ids: Vec<i64>,
}

/// Per-item geocoding outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeItemResult {
    pub location_id: i64,
    pub location_name: String,
    pub status: String,
    /// Which query of the fallback cascade matched, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGeocodeResponse {
    pub updated: i64,
    pub failed: i64,
    pub items: Vec<GeocodeItemResult>,
}
