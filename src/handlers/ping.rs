//! Liveness handler

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::debug;

/// Handle manutenza.ping messages
pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping");

        if let Some(reply) = msg.reply {
            let _ = client
                .publish(reply, serde_json::to_vec(&serde_json::json!({"pong": true}))?.into())
                .await;
        }
    }

    Ok(())
}
