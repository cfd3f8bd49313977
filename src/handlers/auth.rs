//! Login auditing handlers for NATS messages
//!
//! Every attempt is recorded in the login database, successful or not.
//! The users file is reloaded on each login so operator changes take
//! effect without a restart.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::config::Config;
use crate::db::queries;
use crate::services::rate_limiter::RateLimiter;
use crate::types::{
    ClearLoginLogRequest, ClearLoginLogResponse, ErrorResponse, LoginHistoryRequest,
    LoginHistoryResponse, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, Request,
    SuccessResponse, LOGIN_LOG_CONFIRM_PHRASE,
};

/// Handle auth.login messages
pub async fn handle_login(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
    config: Config,
    limiter: Arc<RateLimiter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.login message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LoginRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let username = request.payload.username.trim().to_string();

        if !limiter.check_and_record(&username) {
            warn!("Login attempts for '{}' rate-limited", username);
            let error = ErrorResponse::new(
                request.id,
                "RATE_LIMITED",
                "Too many login attempts, retry later",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let users = match config.users_file.as_deref().map(auth::load_users) {
            Some(Ok(users)) => users,
            Some(Err(e)) => {
                error!("Failed to load users file: {}", e);
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "No users configured");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            None => {
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "No users configured");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match auth::authenticate(&users, &username, &request.payload.password) {
            Some(role) => {
                if let Err(e) =
                    queries::login_log::record_attempt(&pool, &username, Some(&role), true).await
                {
                    error!("Failed to record login: {}", e);
                }
                info!("Operator '{}' logged in ({})", username, role);
                let response =
                    SuccessResponse::new(request.id, LoginResponse { username, role });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            None => {
                if let Err(e) =
                    queries::login_log::record_attempt(&pool, &username, None, false).await
                {
                    error!("Failed to record failed login: {}", e);
                }
                warn!("Failed login attempt for '{}'", username);
                let error = ErrorResponse::new(
                    request.id,
                    "UNAUTHORIZED",
                    "Wrong username or password",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle auth.logout messages
pub async fn handle_logout(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.logout message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LogoutRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::login_log::close_open_session(&pool, &request.payload.username).await {
            Ok(duration) => {
                let response = SuccessResponse::new(
                    request.id,
                    LogoutResponse {
                        closed: duration.is_some(),
                        session_duration_min: duration,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to close session: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle auth.history messages
pub async fn handle_history(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.history message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LoginHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::login_log::list_log(
            &pool,
            request.payload.username.as_deref(),
            request.payload.date_from,
            request.payload.date_to,
        )
        .await
        {
            Ok(items) => {
                let total = items.len() as i64;
                let response =
                    SuccessResponse::new(request.id, LoginHistoryResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list login history: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle auth.clear_log messages
pub async fn handle_clear_log(
    client: Client,
    mut subscriber: Subscriber,
    pool: SqlitePool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.clear_log message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ClearLoginLogRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.payload.confirm != LOGIN_LOG_CONFIRM_PHRASE {
            let error = ErrorResponse::new(
                request.id,
                "CONFIRMATION_REQUIRED",
                format!("Type '{}' to confirm irreversible deletion", LOGIN_LOG_CONFIRM_PHRASE),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::login_log::clear_log(&pool).await {
            Ok(deleted) => {
                warn!("Login log cleared: {} rows deleted", deleted);
                let response =
                    SuccessResponse::new(request.id, ClearLoginLogResponse { deleted });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to clear login log: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
