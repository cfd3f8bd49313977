//! Backup/restore handlers for NATS messages
//!
//! All four operations answer with a per-file report; a missing backup
//! configuration is reported, never fatal.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::backup::BackupService;
use crate::types::{EmptyPayload, ErrorResponse, Request, SuccessResponse};

fn parse_request(
    payload: &[u8],
) -> std::result::Result<Request<EmptyPayload>, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Handle backup.run messages
pub async fn handle_run(
    client: Client,
    mut subscriber: Subscriber,
    service: Option<Arc<BackupService>>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received backup.run message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let Some(ref service) = service else {
            let error = ErrorResponse::new(
                request.id,
                "EXTERNAL_SERVICE_ERROR",
                "Backup repository is not configured",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        };

        let outcome = service.run_backup().await;
        let response = SuccessResponse::new(request.id, outcome);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle backup.restore messages
pub async fn handle_restore(
    client: Client,
    mut subscriber: Subscriber,
    service: Option<Arc<BackupService>>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received backup.restore message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let Some(ref service) = service else {
            let error = ErrorResponse::new(
                request.id,
                "EXTERNAL_SERVICE_ERROR",
                "Backup repository is not configured",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        };

        let outcome = service.restore_missing().await;
        let response = SuccessResponse::new(request.id, outcome);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle backup.status messages
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    service: Option<Arc<BackupService>>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received backup.status message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = match service {
            Some(ref service) => service.status(),
            None => crate::types::BackupStatusResponse {
                configured: false,
                last_backup_at: None,
                files: vec![],
            },
        };
        let response = SuccessResponse::new(request.id, payload);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle backup.test messages
pub async fn handle_test(
    client: Client,
    mut subscriber: Subscriber,
    service: Option<Arc<BackupService>>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received backup.test message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let Some(ref service) = service else {
            let error = ErrorResponse::new(
                request.id,
                "EXTERNAL_SERVICE_ERROR",
                "Backup repository is not configured",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        };

        let outcome = service.probe().await;
        let response = SuccessResponse::new(request.id, outcome);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}
