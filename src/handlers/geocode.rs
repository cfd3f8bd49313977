//! Geocoding handlers for NATS messages
//!
//! Lookups run synchronously, one location at a time, with the geocoder's
//! fixed inter-request delay in between. A failed item never aborts the
//! batch: it is marked 'failed' and stays available for manual retry after
//! the operator fixes the address.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::geocoding::{address_cascade, Geocoder};
use crate::types::{
    Coordinates, EmptyPayload, ErrorResponse, GeocodeItemResult, Location,
    PendingGeocodeResponse, Request, RunGeocodeRequest, RunGeocodeResponse, SuccessResponse,
};

/// Handle geocode.pending messages
pub async fn handle_pending(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received geocode.pending message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::list_missing_coordinates(&pool).await {
            Ok(items) => {
                let total = items.len() as i64;
                let response =
                    SuccessResponse::new(request.id, PendingGeocodeResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list pending geocodes: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle geocode.run messages
pub async fn handle_run(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
    geocoder: Arc<dyn Geocoder>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received geocode.run message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RunGeocodeRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let mut items = Vec::with_capacity(request.payload.location_ids.len());
        let mut updated = 0i64;
        let mut failed = 0i64;

        for &id in &request.payload.location_ids {
            let location = match queries::location::get_location(&pool, id).await {
                Ok(Some(location)) => location,
                Ok(None) => {
                    items.push(GeocodeItemResult {
                        location_id: id,
                        location_name: String::new(),
                        status: "not-found".to_string(),
                        matched_query: None,
                    });
                    continue;
                }
                Err(e) => {
                    // Per-item failures never abort the batch.
                    error!("Failed to load location {}: {}", id, e);
                    failed += 1;
                    items.push(GeocodeItemResult {
                        location_id: id,
                        location_name: String::new(),
                        status: "failed".to_string(),
                        matched_query: None,
                    });
                    continue;
                }
            };

            match run_cascade(geocoder.as_ref(), &location).await {
                Some((coords, matched_query)) => {
                    if let Err(e) =
                        queries::location::set_coordinates(&pool, id, coords.lat, coords.lon).await
                    {
                        error!("Failed to store coordinates for {}: {}", location.name, e);
                        failed += 1;
                        items.push(GeocodeItemResult {
                            location_id: id,
                            location_name: location.name,
                            status: "failed".to_string(),
                            matched_query: None,
                        });
                        continue;
                    }
                    info!("Coordinates found for '{}' using: {}", location.name, matched_query);
                    updated += 1;
                    items.push(GeocodeItemResult {
                        location_id: id,
                        location_name: location.name,
                        status: "success".to_string(),
                        matched_query: Some(matched_query),
                    });
                }
                None => {
                    warn!("No coordinates found for '{}'", location.name);
                    let _ = queries::location::mark_geocode_failed(&pool, id).await;
                    failed += 1;
                    items.push(GeocodeItemResult {
                        location_id: id,
                        location_name: location.name,
                        status: "failed".to_string(),
                        matched_query: None,
                    });
                }
            }
        }

        info!("Geocoding finished: {} updated, {} failed", updated, failed);
        let response = SuccessResponse::new(
            request.id,
            RunGeocodeResponse {
                updated,
                failed,
                items,
            },
        );
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Try the fallback cascade for one location: full address, address without
/// postal code and province, city only. Service errors fall through to the
/// next query; an exhausted cascade means failure.
async fn run_cascade(geocoder: &dyn Geocoder, location: &Location) -> Option<(Coordinates, String)> {
    let queries = address_cascade(
        &location.address,
        location.postal_code.as_deref(),
        &location.city,
        location.province.as_deref(),
    );

    for query in queries {
        match geocoder.geocode(&query).await {
            Ok(Some(coords)) => return Some((coords, query)),
            Ok(None) => {
                debug!("No match for '{}', trying next fallback", query);
            }
            Err(e) => {
                warn!("Geocoding error for '{}': {}", query, e);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted geocoder: resolves exactly one known query string.
    struct MarkerGeocoder {
        marker: &'static str,
        queries_seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for MarkerGeocoder {
        async fn geocode(&self, query: &str) -> anyhow::Result<Option<Coordinates>> {
            self.queries_seen.lock().unwrap().push(query.to_string());
            if query == self.marker {
                Ok(Some(Coordinates { lat: 45.0, lon: 9.0 }))
            } else {
                Ok(None)
            }
        }

        fn name(&self) -> &'static str {
            "marker"
        }
    }

    /// Geocoder that always errors (service down).
    struct BrokenGeocoder;

    #[async_trait]
    impl Geocoder for BrokenGeocoder {
        async fn geocode(&self, _query: &str) -> anyhow::Result<Option<Coordinates>> {
            Err(anyhow::anyhow!("service unavailable"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn location(address: &str, postal: Option<&str>, city: &str, province: Option<&str>) -> Location {
        Location {
            id: 1,
            name: "PV".to_string(),
            address: address.to_string(),
            postal_code: postal.map(|s| s.to_string()),
            city: city.to_string(),
            province: province.map(|s| s.to_string()),
            region: None,
            last_service: None,
            next_service: None,
            equipment: None,
            notes: None,
            lat: None,
            lon: None,
            code: None,
            brand: None,
            contact_name: None,
            contact_phone: None,
            geocode_status: "pending".to_string(),
        }
    }

    #[tokio::test]
    async fn cascade_stops_at_first_match() {
        let geocoder = MarkerGeocoder {
            marker: "Via Roma 1, 20100, Milano, MI, Italia",
            queries_seen: Mutex::new(vec![]),
        };
        let loc = location("Via Roma 1", Some("20100"), "Milano", Some("MI"));

        let result = run_cascade(&geocoder, &loc).await;
        assert!(result.is_some());
        let (_, matched) = result.unwrap();
        assert_eq!(matched, "Via Roma 1, 20100, Milano, MI, Italia");
        assert_eq!(geocoder.queries_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cascade_falls_back_to_city_only() {
        // Only the bare "Milano, Italia" query matches: the address itself
        // is unknown to the geocoder.
        let geocoder = MarkerGeocoder {
            marker: "Milano, Italia",
            queries_seen: Mutex::new(vec![]),
        };
        let loc = location("Via Inesistente 99", Some("20100"), "Milano", Some("MI"));

        let result = run_cascade(&geocoder, &loc).await;
        assert!(result.is_some());
        let (_, matched) = result.unwrap();
        assert_eq!(matched, "Milano, Italia");
        // All three cascade steps were attempted
        assert_eq!(geocoder.queries_seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cascade_exhausted_reports_failure() {
        let geocoder = MarkerGeocoder {
            marker: "Torino, Italia",
            queries_seen: Mutex::new(vec![]),
        };
        let loc = location("Via Inesistente 99", None, "Milano", None);

        assert!(run_cascade(&geocoder, &loc).await.is_none());
    }

    #[tokio::test]
    async fn service_errors_fall_through_without_aborting() {
        let loc = location("Via Roma 1", Some("20100"), "Milano", Some("MI"));
        assert!(run_cascade(&BrokenGeocoder, &loc).await.is_none());
    }
}
