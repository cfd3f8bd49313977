//! Municipality reference data types
//!
//! Static place → coordinate/administrative-code mappings, used to prefill
//! address fields when a new location is entered.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    pub name: String,
    pub code: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub code2: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMunicipalitiesRequest {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMunicipalitiesResponse {
    pub items: Vec<Municipality>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityNameRequest {
    pub name: String,
}

/// CSV import request; upserts by municipality name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMunicipalitiesRequest {
    pub csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMunicipalitiesResponse {
    pub synced: i64,
}
