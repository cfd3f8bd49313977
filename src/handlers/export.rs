//! Export handlers for NATS messages

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::export::{self, DocumentStop};
use crate::types::{
    CsvExportResponse, EmptyPayload, ErrorResponse, ExportBundleResponse, Request,
    SuccessResponse, WorkOrderDocumentRequest, WorkOrderDocumentResponse,
};

/// Handle export.locations messages
pub async fn handle_locations(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received export.locations message");

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

        let outcome = async {
            let items = queries::location::list_locations(&pool, None, None).await?;
            let csv = export::locations_csv(&items)?;
            anyhow::Ok((csv, items.len() as i64))
        }
        .await;

        match outcome {
            Ok((csv, rows)) => {
                let response = SuccessResponse::new(
                    request.id,
                    CsvExportResponse {
                        file_name: format!("locations_{}.csv", Utc::now().format("%Y-%m-%d")),
                        csv,
                        rows,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to export locations: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle export.history messages
pub async fn handle_history(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received export.history message");

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

        let outcome = async {
            let items = queries::history::list_history(&pool, None).await?;
            let csv = export::history_csv(&items)?;
            anyhow::Ok((csv, items.len() as i64))
        }
        .await;

        match outcome {
            Ok((csv, rows)) => {
                let response = SuccessResponse::new(
                    request.id,
                    CsvExportResponse {
                        file_name: format!("history_{}.csv", Utc::now().format("%Y-%m-%d")),
                        csv,
                        rows,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to export history: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle export.workorder_document messages
pub async fn handle_document(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received export.workorder_document message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<WorkOrderDocumentRequest> = match serde_json::from_slice(&msg.payload)
        {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let uid = &request.payload.work_order_uid;
        let outcome = async {
            let (number, distance, stops): (i64, Option<f64>, Vec<DocumentStop>) =
                if request.payload.from_history {
                    let rows = queries::history::list_history(&pool, Some(uid)).await?;
                    match rows.first() {
                        Some(first) => (
                            first.work_order_number,
                            first.total_distance_km,
                            rows.iter().map(DocumentStop::from).collect(),
                        ),
                        None => (0, None, vec![]),
                    }
                } else {
                    let rows = queries::work_order::get_work_order(&pool, uid).await?;
                    match rows.first() {
                        Some(first) => (
                            first.work_order_number,
                            first.total_distance_km,
                            rows.iter().map(DocumentStop::from).collect(),
                        ),
                        None => (0, None, vec![]),
                    }
                };
            anyhow::Ok((number, distance, stops))
        }
        .await;

        match outcome {
            Ok((_, _, stops)) if stops.is_empty() => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Work order not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Ok((number, distance, stops)) => {
                let (document, pages) = export::work_order_document(number, distance, &stops);
                let response = SuccessResponse::new(
                    request.id,
                    WorkOrderDocumentResponse {
                        file_name: format!("ordine_lavoro_{}.txt", number),
                        document,
                        pages,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to render work order document: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle export.bundle messages
pub async fn handle_bundle(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received export.bundle message");

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

        let outcome = async {
            let locations = queries::location::list_locations(&pool, None, None).await?;
            let history = queries::history::list_history(&pool, None).await?;
            let zip = export::bundle_zip(
                &export::locations_csv(&locations)?,
                &export::history_csv(&history)?,
            )?;
            anyhow::Ok(zip)
        }
        .await;

        match outcome {
            Ok(zip) => {
                let response = SuccessResponse::new(
                    request.id,
                    ExportBundleResponse {
                        file_name: format!("manutenza_export_{}.zip", Utc::now().format("%Y-%m-%d")),
                        zip_base64: BASE64.encode(zip),
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build export bundle: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
