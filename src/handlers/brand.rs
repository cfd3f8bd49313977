//! Brand catalog handlers for NATS messages

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::{is_unique_violation, queries};
use crate::types::{
    BrandListResponse, CreateBrandRequest, DeleteBrandRequest, EmptyPayload, ErrorResponse,
    Request, SuccessResponse,
};

/// Handle brand.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received brand.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateBrandRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let name = request.payload.name.trim().to_string();
        if name.is_empty() {
            let error = ErrorResponse::new(request.id, "VALIDATION_ERROR", "Brand name is required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::brand::create_brand(&pool, &name).await {
            Ok(brand) => {
                let response = SuccessResponse::new(request.id, brand);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) if is_unique_violation(&e) => {
                let error = ErrorResponse::new(
                    request.id,
                    "CONSTRAINT_VIOLATION",
                    format!("Brand '{}' already exists", name),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create brand: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle brand.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received brand.list message");

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

        match queries::brand::list_brands(&pool).await {
            Ok(items) => {
                let total = items.len() as i64;
                let response =
                    SuccessResponse::new(request.id, BrandListResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list brands: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle brand.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received brand.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<DeleteBrandRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::brand::delete_brand(&pool, request.payload.id).await {
            Ok(true) => {
                let response =
                    SuccessResponse::new(request.id, serde_json::json!({ "deleted": true }));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Brand not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete brand: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
