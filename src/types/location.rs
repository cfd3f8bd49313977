//! Point-of-sale location types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Point-of-sale location entity.
///
/// `lat`/`lon` are stored as two nullable columns; a coordinate is valid
/// only when both are present; use [`Location::coordinates`] instead of
/// reading the raw fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub postal_code: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub region: Option<String>,
    pub last_service: Option<NaiveDate>,
    pub next_service: Option<NaiveDate>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub code: Option<String>,
    pub brand: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,

    /// Geocoding status: 'pending', 'success', 'failed'
    pub geocode_status: String,
}

impl Location {
    /// Returns the coordinate only when both components are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }
}

/// Request to create a location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: String,
    pub postal_code: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub region: Option<String>,
    pub last_service: Option<NaiveDate>,
    pub next_service: Option<NaiveDate>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub code: Option<String>,
    pub brand: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

/// Request to update a location (full-row semantics: every mutable field
/// is overwritten with the submitted value)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub id: i64,
    #[serde(flatten)]
    pub fields: CreateLocationRequest,
}

/// Request to delete one or more locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLocationsRequest {
    pub ids: Vec<i64>,
}

/// Request to list locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsRequest {
    pub brand: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsResponse {
    pub items: Vec<Location>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationIdRequest {
    pub id: i64,
}

/// One row of an editable snapshot, as exchanged with the bulk-save
/// operation. `id` is null for rows the operator added in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSnapshotRow {
    pub id: Option<i64>,
    pub name: String,
    pub address: String,
    pub postal_code: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub region: Option<String>,
    pub last_service: Option<NaiveDate>,
    pub next_service: Option<NaiveDate>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub code: Option<String>,
    pub brand: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

/// Request to reconcile an edited snapshot against the original one.
/// Deleted rows, inserted rows and changed columns are derived by diffing
/// the two lists; nothing else is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSaveLocationsRequest {
    pub original: Vec<LocationSnapshotRow>,
    pub edited: Vec<LocationSnapshotRow>,
}

/// Outcome of a bulk save, counted per statement kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSaveLocationsResponse {
    pub deleted: i64,
    pub inserted: i64,
    pub updated: i64,
}

/// Request to append location rows from CSV content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLocationsRequest {
    pub csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLocationsResponse {
    pub imported: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_with(lat: Option<f64>, lon: Option<f64>) -> Location {
        Location {
            id: 1,
            name: "PV Milano Centro".to_string(),
            address: "Via Roma 1".to_string(),
            postal_code: Some("20100".to_string()),
            city: "Milano".to_string(),
            province: Some("MI".to_string()),
            region: Some("Lombardia".to_string()),
            last_service: None,
            next_service: None,
            equipment: None,
            notes: None,
            lat,
            lon,
            code: None,
            brand: Some("CARREFOUR MARKET".to_string()),
            contact_name: None,
            contact_phone: None,
            geocode_status: "pending".to_string(),
        }
    }

    #[test]
    fn coordinates_require_both_components() {
        assert!(location_with(Some(45.0), Some(9.0)).coordinates().is_some());
        assert!(location_with(Some(45.0), None).coordinates().is_none());
        assert!(location_with(None, Some(9.0)).coordinates().is_none());
        assert!(location_with(None, None).coordinates().is_none());
    }

    #[test]
    fn snapshot_row_with_null_id_parses() {
        let json = r#"{
            "id": null,
            "name": "PV Nuovo",
            "address": "Via Nuova 5",
            "city": "Pavia"
        }"#;
        let row: LocationSnapshotRow = serde_json::from_str(json).unwrap();
        assert!(row.id.is_none());
        assert_eq!(row.city, "Pavia");
    }

    #[test]
    fn update_request_flattens_fields() {
        let json = r#"{
            "id": 7,
            "name": "PV Milano Centro",
            "address": "Via Roma 1",
            "city": "Milano"
        }"#;
        let req: UpdateLocationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.id, 7);
        assert_eq!(req.fields.name, "PV Milano Centro");
    }
}
