//! Geocoding abstraction layer
//!
//! External lookups run synchronously with a fixed inter-request delay to
//! respect the upstream rate limit; there is no batching, no backoff and no
//! cancellation. Failures are reported per item and retained for manual
//! retry. Tests and development use a deterministic mock with no network.
//!
//! Configuration via the GEOCODER_BACKEND env variable:
//! - "mock" → MockGeocoder (tests, development)
//! - "nominatim" → RateLimitedNominatimGeocoder (production)

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::services::nominatim::NominatimClient;
use crate::types::Coordinates;

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text query to coordinates.
    /// Returns None when the query cannot be resolved.
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Build the fallback cascade for one location: full address first, then
/// the address without postal code and province, then the city alone.
/// Empty components are skipped so a location without a postal code does
/// not produce a query with a dangling comma.
pub fn address_cascade(
    address: &str,
    postal_code: Option<&str>,
    city: &str,
    province: Option<&str>,
) -> Vec<String> {
    let join = |parts: &[&str]| {
        parts
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    let full = join(&[
        address,
        postal_code.unwrap_or(""),
        city,
        province.unwrap_or(""),
        "Italia",
    ]);
    let simple = join(&[address, city, "Italia"]);
    let city_only = join(&[city, "Italia"]);

    let mut cascade = vec![full];
    for candidate in [simple, city_only] {
        if !cascade.contains(&candidate) {
            cascade.push(candidate);
        }
    }
    cascade
}

// ==========================================================================
// MockGeocoder
// ==========================================================================

/// Mock geocoder for testing - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic coordinates from a query hash, kept inside Italy.
    fn hash_to_coordinates(query: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        let hash = hasher.finish();

        // Inner Italian bounds, away from the coastline
        const LAT_MIN: f64 = 41.5;
        const LAT_MAX: f64 = 46.0;
        const LON_MIN: f64 = 8.5;
        const LON_MAX: f64 = 13.5;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lon_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lon: LON_MIN + lon_normalized * (LON_MAX - LON_MIN),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        Ok(Some(Self::hash_to_coordinates(query)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// IntervalLimiter
// ==========================================================================

/// Enforces a fixed minimum interval between calls
pub struct IntervalLimiter {
    last_call: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl IntervalLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                drop(last); // Release lock while sleeping
                tokio::time::sleep(wait_time).await;
                last = self.last_call.lock().await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// RateLimitedNominatimGeocoder
// ==========================================================================

/// Default interval between requests (1.5 s - Nominatim allows 1 req/s)
const DEFAULT_RATE_LIMIT_MS: u64 = 1500;

/// Nominatim client behind a fixed inter-request delay
pub struct RateLimitedNominatimGeocoder {
    client: NominatimClient,
    limiter: IntervalLimiter,
}

impl RateLimitedNominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self::with_interval(base_url, Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    pub fn with_interval(base_url: &str, min_interval: Duration) -> Self {
        Self {
            client: NominatimClient::new(base_url),
            limiter: IntervalLimiter::new(min_interval),
        }
    }
}

#[async_trait]
impl Geocoder for RateLimitedNominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        self.limiter.wait().await;

        match self.client.search(query).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!("Geocoding failed for '{}': {}", query, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory
// ==========================================================================

/// Create a geocoder based on the GEOCODER_BACKEND environment variable.
///
/// - `GEOCODER_BACKEND`: "mock" or "nominatim" (default: "mock")
/// - `NOMINATIM_RATE_LIMIT_MS`: minimum interval between requests (default: 1500)
pub fn create_geocoder(nominatim_url: &str) -> Box<dyn Geocoder> {
    let backend = std::env::var("GEOCODER_BACKEND").unwrap_or_else(|_| "mock".to_string());

    match backend.as_str() {
        "mock" => {
            tracing::info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        "nominatim" => {
            let rate_limit_ms = std::env::var("NOMINATIM_RATE_LIMIT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_MS);
            tracing::info!("Using RateLimitedNominatimGeocoder ({} ms interval)", rate_limit_ms);
            Box::new(RateLimitedNominatimGeocoder::with_interval(
                nominatim_url,
                Duration::from_millis(rate_limit_ms),
            ))
        }
        _ => {
            tracing::warn!("Unknown GEOCODER_BACKEND '{}', using mock", backend);
            Box::new(MockGeocoder::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_geocoder_always_resolves() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("Via Roma 1, Milano, Italia").await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn mock_geocoder_is_deterministic() {
        let geocoder = MockGeocoder::new();
        let a = geocoder.geocode("Via Roma 1, Milano, Italia").await.unwrap().unwrap();
        let b = geocoder.geocode("Via Roma 1, Milano, Italia").await.unwrap().unwrap();
        assert_eq!(a.lat, b.lat);
        assert_eq!(a.lon, b.lon);
    }

    #[tokio::test]
    async fn mock_geocoder_distinguishes_addresses() {
        let geocoder = MockGeocoder::new();
        let milano = geocoder.geocode("Via Roma 1, Milano, Italia").await.unwrap().unwrap();
        let torino = geocoder.geocode("Via Po 2, Torino, Italia").await.unwrap().unwrap();
        assert_ne!(milano.lat, torino.lat);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_in_italy() {
        let geocoder = MockGeocoder::new();
        for query in ["Milano, Italia", "Pavia, Italia", "Bergamo, Italia", "Lodi, Italia"] {
            let c = geocoder.geocode(query).await.unwrap().unwrap();
            assert!((41.5..=46.0).contains(&c.lat), "lat {} out of bounds for {}", c.lat, query);
            assert!((8.5..=13.5).contains(&c.lon), "lon {} out of bounds for {}", c.lon, query);
        }
    }

    #[tokio::test]
    async fn interval_limiter_enforces_minimum_gap() {
        let limiter = IntervalLimiter::new(Duration::from_millis(100));

        let start = Instant::now();

        limiter.wait().await;
        let after_first = start.elapsed();
        assert!(after_first < Duration::from_millis(50), "first call should be immediate");

        limiter.wait().await;
        let after_second = start.elapsed();
        assert!(
            after_second >= Duration::from_millis(100),
            "second call should wait at least 100ms, took {:?}",
            after_second
        );
    }

    #[tokio::test]
    async fn interval_limiter_is_free_after_gap() {
        let limiter = IntervalLimiter::new(Duration::from_millis(50));

        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn cascade_has_three_steps_for_full_address() {
        let cascade = address_cascade("Via Roma 1", Some("20100"), "Milano", Some("MI"));
        assert_eq!(
            cascade,
            vec![
                "Via Roma 1, 20100, Milano, MI, Italia",
                "Via Roma 1, Milano, Italia",
                "Milano, Italia",
            ]
        );
    }

    #[test]
    fn cascade_collapses_when_postal_and_province_missing() {
        let cascade = address_cascade("Via Roma 1", None, "Milano", None);
        assert_eq!(
            cascade,
            vec!["Via Roma 1, Milano, Italia", "Milano, Italia"]
        );
    }

    #[test]
    fn cascade_city_only_when_address_blank() {
        let cascade = address_cascade("", None, "Milano", None);
        assert_eq!(cascade, vec!["Milano, Italia"]);
    }
}
