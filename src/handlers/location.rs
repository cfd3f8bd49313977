//! Location handlers for NATS messages

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::types::{
    BulkSaveLocationsRequest, CreateLocationRequest, DeleteLocationsRequest, ErrorResponse,
    ImportLocationsRequest, ImportLocationsResponse, ListLocationsRequest, ListLocationsResponse,
    LocationIdRequest, Request, SuccessResponse, UpdateLocationRequest,
};

/// Handle location.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListLocationsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::list_locations(
            &pool,
            request.payload.brand.as_deref(),
            request.payload.search.as_deref(),
        )
        .await
        {
            Ok(items) => {
                let total = items.len() as i64;
                let response =
                    SuccessResponse::new(request.id, ListLocationsResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list locations: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LocationIdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::get_location(&pool, request.payload.id).await {
            Ok(Some(location)) => {
                let response = SuccessResponse::new(request.id, location);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Location not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get location: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateLocationRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.payload.name.trim().is_empty() || request.payload.city.trim().is_empty() {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Name and city are required",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::location::create_location(&pool, &request.payload).await {
            Ok(location) => {
                let response = SuccessResponse::new(request.id, location);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create location: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.update messages
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateLocationRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::update_location(&pool, request.payload.id, &request.payload.fields)
            .await
        {
            Ok(Some(location)) => {
                let response = SuccessResponse::new(request.id, location);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Location not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update location: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<DeleteLocationsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::delete_locations(&pool, &request.payload.ids).await {
            Ok(deleted) => {
                let response =
                    SuccessResponse::new(request.id, serde_json::json!({ "deleted": deleted }));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete locations: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.bulk_save messages
pub async fn handle_bulk_save(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.bulk_save message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<BulkSaveLocationsRequest> = match serde_json::from_slice(&msg.payload)
        {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::bulk_save(&pool, &request.payload.original, &request.payload.edited)
            .await
        {
            Ok(outcome) => {
                let response = SuccessResponse::new(request.id, outcome);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to bulk-save locations: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle location.import messages
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received location.import message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportLocationsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::location::import_csv(&pool, &request.payload.csv).await {
            Ok(imported) => {
                let response =
                    SuccessResponse::new(request.id, ImportLocationsResponse { imported });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                // Column mismatches land here too; nothing was written.
                error!("Failed to import locations: {}", e);
                let error = ErrorResponse::new(request.id, "VALIDATION_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
