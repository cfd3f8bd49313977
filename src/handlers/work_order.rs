//! Work order handlers for NATS messages

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::{geo, schedule};
use crate::types::{
    Coordinates, CreateWorkOrderRequest, DeleteWorkOrderRowsRequest, DeletedRowsResponse,
    EmptyPayload, ErrorResponse, GetWorkOrderResponse, ListWorkOrdersResponse, Request,
    RouteDistanceRequest, RouteDistanceResponse, SuccessResponse, UpdateWorkOrderRequest,
    UpdateWorkOrderResponse, WorkOrderUidRequest,
};

/// Handle workorder.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        // A payload missing the structural keys (location name, technician,
        // scheduled date) fails to deserialize here; the order is rejected
        // before anything touches the database.
        let request: Request<CreateWorkOrderRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.payload.stops.is_empty() {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "A work order needs at least one stop",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }
        if request
            .payload
            .stops
            .iter()
            .any(|s| s.location_name.trim().is_empty())
        {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Every stop needs a location name",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let stops: Vec<_> = request
            .payload
            .stops
            .iter()
            .map(|stop| {
                let time = stop
                    .scheduled_time
                    .as_ref()
                    .and_then(schedule::normalize_time);
                (stop.clone(), time)
            })
            .collect();

        match queries::work_order::create_work_order(
            &pool,
            &stops,
            request.payload.total_distance_km,
        )
        .await
        {
            Ok(created) => {
                info!(
                    "Work order {} created ({} stops)",
                    created.work_order_number, created.rows
                );
                let response = SuccessResponse::new(request.id, created);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create work order: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.list message");

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

        match queries::work_order::list_work_orders(&pool).await {
            Ok(items) => {
                let total = items.len() as i64;
                let response =
                    SuccessResponse::new(request.id, ListWorkOrdersResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list work orders: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<WorkOrderUidRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::work_order::get_work_order(&pool, &request.payload.work_order_uid).await {
            Ok(rows) if rows.is_empty() => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Work order not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Ok(rows) => {
                let response = SuccessResponse::new(request.id, GetWorkOrderResponse { rows });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get work order: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.update messages
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateWorkOrderRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let outcome = async {
            let mut tx = pool.begin().await?;
            let mut updated = 0i64;
            for edit in &request.payload.rows {
                let time = edit
                    .scheduled_time
                    .as_ref()
                    .and_then(schedule::normalize_time);
                if queries::work_order::update_row(
                    &mut tx,
                    &request.payload.work_order_uid,
                    edit.id,
                    edit.technician.as_deref(),
                    edit.scheduled_date,
                    time,
                    edit.contact_name.as_deref(),
                    edit.contact_phone.as_deref(),
                    edit.notes.as_deref(),
                )
                .await?
                {
                    updated += 1;
                }
            }
            tx.commit().await?;
            anyhow::Ok(updated)
        }
        .await;

        match outcome {
            Ok(updated) => {
                let response =
                    SuccessResponse::new(request.id, UpdateWorkOrderResponse { updated });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update work order: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.delete_rows messages
pub async fn handle_delete_rows(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.delete_rows message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<DeleteWorkOrderRowsRequest> =
            match serde_json::from_slice(&msg.payload) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse request: {}", e);
                    let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            };

        match queries::work_order::delete_rows(
            &pool,
            &request.payload.work_order_uid,
            &request.payload.row_ids,
        )
        .await
        {
            Ok(deleted) => {
                let response =
                    SuccessResponse::new(request.id, DeletedRowsResponse { deleted });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete work order rows: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<WorkOrderUidRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::work_order::delete_order(&pool, &request.payload.work_order_uid).await {
            Ok(0) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Work order not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Ok(deleted) => {
                info!(
                    "Work order {} deleted ({} rows)",
                    request.payload.work_order_uid, deleted
                );
                let response =
                    SuccessResponse::new(request.id, DeletedRowsResponse { deleted });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete work order: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle workorder.complete messages
pub async fn handle_complete(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received workorder.complete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<WorkOrderUidRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::work_order::complete_work_order(&pool, &request.payload.work_order_uid).await
        {
            Ok(Some(outcome)) => {
                info!(
                    "Work order {} completed: {} rows archived, {} locations updated",
                    outcome.work_order_uid, outcome.archived_rows, outcome.locations_updated
                );
                let response = SuccessResponse::new(request.id, outcome);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                // No rows for this uid: nothing was written, the caller
                // gets a not-found report.
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Work order not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                // The transaction rolled back; the order is still active.
                error!("Failed to complete work order: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle route.distance messages
pub async fn handle_route_distance(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.distance message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteDistanceRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let outcome = resolve_route(&pool, &request.payload.location_ids).await;
        match outcome {
            Ok(stops) => {
                let distance_km = geo::route_distance(&stops);
                let response = SuccessResponse::new(
                    request.id,
                    RouteDistanceResponse {
                        distance_km,
                        stops: stops.len() as i64,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(RouteError::MissingCoordinates(name)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "VALIDATION_ERROR",
                    format!("Location '{}' has no coordinates", name),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(RouteError::UnknownLocation(id)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "NOT_FOUND",
                    format!("Location {} not found", id),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(RouteError::Database(e)) => {
                error!("Failed to resolve route: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

enum RouteError {
    UnknownLocation(i64),
    MissingCoordinates(String),
    Database(anyhow::Error),
}

/// Resolve location ids to coordinates in path order. Every stop must
/// carry a complete coordinate; callers filter incomplete ones up front.
async fn resolve_route(pool: &SqlitePool, ids: &[i64]) -> std::result::Result<Vec<Coordinates>, RouteError> {
    let mut stops = Vec::with_capacity(ids.len());
    for &id in ids {
        let location = queries::location::get_location(pool, id)
            .await
            .map_err(RouteError::Database)?
            .ok_or(RouteError::UnknownLocation(id))?;
        let coords = location
            .coordinates()
            .ok_or_else(|| RouteError::MissingCoordinates(location.name.clone()))?;
        stops.push(coords);
    }
    Ok(stops)
}
