//! Nominatim geocoding client

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Coordinates;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Manutenza/1.0 (maintenance scheduling)")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.to_string(),
            client,
        }
    }

    /// Resolve a free-text address query to coordinates.
    /// The caller builds the query strings (the fallback cascade lives there).
    pub async fn search(&self, query: &str) -> Result<Option<Coordinates>> {
        let url = format!(
            "{}/search?q={}&format=json&countrycodes=it&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        if let Some(result) = results.first() {
            let lat: f64 = result.lat.parse().context("Invalid latitude")?;
            let lon: f64 = result.lon.parse().context("Invalid longitude")?;

            Ok(Some(Coordinates { lat, lon }))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests hit the public Nominatim API and are ignored by default.

    #[tokio::test]
    #[ignore]
    async fn test_search_duomo_milano() {
        let client = NominatimClient::new("https://nominatim.openstreetmap.org");

        let result = client
            .search("Piazza del Duomo, 20121, Milano, MI, Italia")
            .await
            .unwrap();

        assert!(result.is_some());
        let coords = result.unwrap();

        // Piazza del Duomo is around 45.46°N, 9.19°E
        assert!((coords.lat - 45.46).abs() < 0.1);
        assert!((coords.lon - 9.19).abs() < 0.1);
    }
}
