//! NATS message handlers

pub mod auth;
pub mod backup;
pub mod brand;
pub mod export;
pub mod geocode;
pub mod history;
pub mod location;
pub mod municipality;
pub mod ping;
pub mod work_order;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::config::Config;
use crate::services::backup::BackupService;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::rate_limiter::RateLimiter;

/// Login attempts allowed per username within the window
const LOGIN_MAX_ATTEMPTS: usize = 5;
const LOGIN_WINDOW_SECS: u64 = 300;

/// Start all message handlers
pub async fn start_handlers(
    client: Client,
    pool: SqlitePool,
    login_pool: SqlitePool,
    config: &Config,
) -> Result<()> {
    info!("Starting message handlers...");

    // Shared geocoder
    let geocoder: Arc<dyn Geocoder> = Arc::from(create_geocoder(&config.nominatim_url));
    info!("Geocoder initialized: {}", geocoder.name());

    // Backup service (absent when not configured; handlers report that)
    let backup_service = config.backup.as_ref().map(|backup_config| {
        Arc::new(BackupService::new(
            backup_config,
            vec![config.database_path.clone(), config.login_db_path.clone()],
        ))
    });

    let login_limiter = Arc::new(RateLimiter::new(LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECS));

    // Subscribe to all subjects
    let ping_sub = client.subscribe("manutenza.ping").await?;

    let auth_login_sub = client.subscribe("manutenza.auth.login").await?;
    let auth_logout_sub = client.subscribe("manutenza.auth.logout").await?;
    let auth_history_sub = client.subscribe("manutenza.auth.history").await?;
    let auth_clear_sub = client.subscribe("manutenza.auth.clear_log").await?;

    // Location subjects
    let location_list_sub = client.subscribe("manutenza.location.list").await?;
    let location_get_sub = client.subscribe("manutenza.location.get").await?;
    let location_create_sub = client.subscribe("manutenza.location.create").await?;
    let location_update_sub = client.subscribe("manutenza.location.update").await?;
    let location_delete_sub = client.subscribe("manutenza.location.delete").await?;
    let location_bulk_save_sub = client.subscribe("manutenza.location.bulk_save").await?;
    let location_import_sub = client.subscribe("manutenza.location.import").await?;

    // Municipality subjects
    let municipality_list_sub = client.subscribe("manutenza.municipality.list").await?;
    let municipality_get_sub = client.subscribe("manutenza.municipality.get").await?;
    let municipality_import_sub = client.subscribe("manutenza.municipality.import").await?;

    // Brand subjects
    let brand_create_sub = client.subscribe("manutenza.brand.create").await?;
    let brand_list_sub = client.subscribe("manutenza.brand.list").await?;
    let brand_delete_sub = client.subscribe("manutenza.brand.delete").await?;

    // Work order subjects
    let wo_create_sub = client.subscribe("manutenza.workorder.create").await?;
    let wo_list_sub = client.subscribe("manutenza.workorder.list").await?;
    let wo_get_sub = client.subscribe("manutenza.workorder.get").await?;
    let wo_update_sub = client.subscribe("manutenza.workorder.update").await?;
    let wo_delete_rows_sub = client.subscribe("manutenza.workorder.delete_rows").await?;
    let wo_delete_sub = client.subscribe("manutenza.workorder.delete").await?;
    let wo_complete_sub = client.subscribe("manutenza.workorder.complete").await?;
    let route_distance_sub = client.subscribe("manutenza.route.distance").await?;

    // History subjects
    let history_list_sub = client.subscribe("manutenza.history.list").await?;
    let history_delete_rows_sub = client.subscribe("manutenza.history.delete_rows").await?;
    let history_clear_sub = client.subscribe("manutenza.history.clear").await?;
    let report_activity_sub = client.subscribe("manutenza.report.activity").await?;

    // Geocode subjects
    let geocode_pending_sub = client.subscribe("manutenza.geocode.pending").await?;
    let geocode_run_sub = client.subscribe("manutenza.geocode.run").await?;

    // Backup subjects
    let backup_run_sub = client.subscribe("manutenza.backup.run").await?;
    let backup_restore_sub = client.subscribe("manutenza.backup.restore").await?;
    let backup_status_sub = client.subscribe("manutenza.backup.status").await?;
    let backup_test_sub = client.subscribe("manutenza.backup.test").await?;

    // Export subjects
    let export_locations_sub = client.subscribe("manutenza.export.locations").await?;
    let export_history_sub = client.subscribe("manutenza.export.history").await?;
    let export_document_sub = client.subscribe("manutenza.export.workorder_document").await?;
    let export_bundle_sub = client.subscribe("manutenza.export.bundle").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();

    let client_auth_login = client.clone();
    let client_auth_logout = client.clone();
    let client_auth_history = client.clone();
    let client_auth_clear = client.clone();

    let client_location_list = client.clone();
    let client_location_get = client.clone();
    let client_location_create = client.clone();
    let client_location_update = client.clone();
    let client_location_delete = client.clone();
    let client_location_bulk_save = client.clone();
    let client_location_import = client.clone();

    let client_municipality_list = client.clone();
    let client_municipality_get = client.clone();
    let client_municipality_import = client.clone();

    let client_brand_create = client.clone();
    let client_brand_list = client.clone();
    let client_brand_delete = client.clone();

    let client_wo_create = client.clone();
    let client_wo_list = client.clone();
    let client_wo_get = client.clone();
    let client_wo_update = client.clone();
    let client_wo_delete_rows = client.clone();
    let client_wo_delete = client.clone();
    let client_wo_complete = client.clone();
    let client_route_distance = client.clone();

    let client_history_list = client.clone();
    let client_history_delete_rows = client.clone();
    let client_history_clear = client.clone();
    let client_report_activity = client.clone();

    let client_geocode_pending = client.clone();
    let client_geocode_run = client.clone();

    let client_backup_run = client.clone();
    let client_backup_restore = client.clone();
    let client_backup_status = client.clone();
    let client_backup_test = client.clone();

    let client_export_locations = client.clone();
    let client_export_history = client.clone();
    let client_export_document = client.clone();
    let client_export_bundle = client.clone();

    let pool_location_list = pool.clone();
    let pool_location_get = pool.clone();
    let pool_location_create = pool.clone();
    let pool_location_update = pool.clone();
    let pool_location_delete = pool.clone();
    let pool_location_bulk_save = pool.clone();
    let pool_location_import = pool.clone();

    let pool_municipality_list = pool.clone();
    let pool_municipality_get = pool.clone();
    let pool_municipality_import = pool.clone();

    let pool_brand_create = pool.clone();
    let pool_brand_list = pool.clone();
    let pool_brand_delete = pool.clone();

    let pool_wo_create = pool.clone();
    let pool_wo_list = pool.clone();
    let pool_wo_get = pool.clone();
    let pool_wo_update = pool.clone();
    let pool_wo_delete_rows = pool.clone();
    let pool_wo_delete = pool.clone();
    let pool_wo_complete = pool.clone();
    let pool_route_distance = pool.clone();

    let pool_history_list = pool.clone();
    let pool_history_delete_rows = pool.clone();
    let pool_history_clear = pool.clone();
    let pool_report_activity = pool.clone();

    let pool_geocode_pending = pool.clone();
    let pool_geocode_run = pool.clone();

    let pool_export_locations = pool.clone();
    let pool_export_history = pool.clone();
    let pool_export_document = pool.clone();
    let pool_export_bundle = pool.clone();

    let login_pool_login = login_pool.clone();
    let login_pool_logout = login_pool.clone();
    let login_pool_history = login_pool.clone();
    let login_pool_clear = login_pool.clone();

    let config_login = config.clone();

    let backup_run_service = backup_service.clone();
    let backup_restore_service = backup_service.clone();
    let backup_status_service = backup_service.clone();
    let backup_test_service = backup_service.clone();

    let geocoder_run = geocoder.clone();

    // Spawn handlers
    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    let auth_login_handle = tokio::spawn(async move {
        auth::handle_login(
            client_auth_login,
            auth_login_sub,
            login_pool_login,
            config_login,
            login_limiter,
        )
        .await
    });

    let auth_logout_handle = tokio::spawn(async move {
        auth::handle_logout(client_auth_logout, auth_logout_sub, login_pool_logout).await
    });

    let auth_history_handle = tokio::spawn(async move {
        auth::handle_history(client_auth_history, auth_history_sub, login_pool_history).await
    });

    let auth_clear_handle = tokio::spawn(async move {
        auth::handle_clear_log(client_auth_clear, auth_clear_sub, login_pool_clear).await
    });

    // Location handlers
    let location_list_handle = tokio::spawn(async move {
        location::handle_list(client_location_list, location_list_sub, pool_location_list).await
    });

    let location_get_handle = tokio::spawn(async move {
        location::handle_get(client_location_get, location_get_sub, pool_location_get).await
    });

    let location_create_handle = tokio::spawn(async move {
        location::handle_create(client_location_create, location_create_sub, pool_location_create)
            .await
    });

    let location_update_handle = tokio::spawn(async move {
        location::handle_update(client_location_update, location_update_sub, pool_location_update)
            .await
    });

    let location_delete_handle = tokio::spawn(async move {
        location::handle_delete(client_location_delete, location_delete_sub, pool_location_delete)
            .await
    });

    let location_bulk_save_handle = tokio::spawn(async move {
        location::handle_bulk_save(
            client_location_bulk_save,
            location_bulk_save_sub,
            pool_location_bulk_save,
        )
        .await
    });

    let location_import_handle = tokio::spawn(async move {
        location::handle_import(client_location_import, location_import_sub, pool_location_import)
            .await
    });

    // Municipality handlers
    let municipality_list_handle = tokio::spawn(async move {
        municipality::handle_list(
            client_municipality_list,
            municipality_list_sub,
            pool_municipality_list,
        )
        .await
    });

    let municipality_get_handle = tokio::spawn(async move {
        municipality::handle_get(
            client_municipality_get,
            municipality_get_sub,
            pool_municipality_get,
        )
        .await
    });

    let municipality_import_handle = tokio::spawn(async move {
        municipality::handle_import(
            client_municipality_import,
            municipality_import_sub,
            pool_municipality_import,
        )
        .await
    });

    // Brand handlers
    let brand_create_handle = tokio::spawn(async move {
        brand::handle_create(client_brand_create, brand_create_sub, pool_brand_create).await
    });

    let brand_list_handle = tokio::spawn(async move {
        brand::handle_list(client_brand_list, brand_list_sub, pool_brand_list).await
    });

    let brand_delete_handle = tokio::spawn(async move {
        brand::handle_delete(client_brand_delete, brand_delete_sub, pool_brand_delete).await
    });

    // Work order handlers
    let wo_create_handle = tokio::spawn(async move {
        work_order::handle_create(client_wo_create, wo_create_sub, pool_wo_create).await
    });

    let wo_list_handle = tokio::spawn(async move {
        work_order::handle_list(client_wo_list, wo_list_sub, pool_wo_list).await
    });

    let wo_get_handle = tokio::spawn(async move {
        work_order::handle_get(client_wo_get, wo_get_sub, pool_wo_get).await
    });

    let wo_update_handle = tokio::spawn(async move {
        work_order::handle_update(client_wo_update, wo_update_sub, pool_wo_update).await
    });

    let wo_delete_rows_handle = tokio::spawn(async move {
        work_order::handle_delete_rows(client_wo_delete_rows, wo_delete_rows_sub, pool_wo_delete_rows)
            .await
    });

    let wo_delete_handle = tokio::spawn(async move {
        work_order::handle_delete(client_wo_delete, wo_delete_sub, pool_wo_delete).await
    });

    let wo_complete_handle = tokio::spawn(async move {
        work_order::handle_complete(client_wo_complete, wo_complete_sub, pool_wo_complete).await
    });

    let route_distance_handle = tokio::spawn(async move {
        work_order::handle_route_distance(
            client_route_distance,
            route_distance_sub,
            pool_route_distance,
        )
        .await
    });

    // History handlers
    let history_list_handle = tokio::spawn(async move {
        history::handle_list(client_history_list, history_list_sub, pool_history_list).await
    });

    let history_delete_rows_handle = tokio::spawn(async move {
        history::handle_delete_rows(
            client_history_delete_rows,
            history_delete_rows_sub,
            pool_history_delete_rows,
        )
        .await
    });

    let history_clear_handle = tokio::spawn(async move {
        history::handle_clear(client_history_clear, history_clear_sub, pool_history_clear).await
    });

    let report_activity_handle = tokio::spawn(async move {
        history::handle_report(client_report_activity, report_activity_sub, pool_report_activity)
            .await
    });

    // Geocode handlers
    let geocode_pending_handle = tokio::spawn(async move {
        geocode::handle_pending(client_geocode_pending, geocode_pending_sub, pool_geocode_pending)
            .await
    });

    let geocode_run_handle = tokio::spawn(async move {
        geocode::handle_run(client_geocode_run, geocode_run_sub, pool_geocode_run, geocoder_run)
            .await
    });

    // Backup handlers
    let backup_run_handle = tokio::spawn(async move {
        backup::handle_run(client_backup_run, backup_run_sub, backup_run_service).await
    });

    let backup_restore_handle = tokio::spawn(async move {
        backup::handle_restore(client_backup_restore, backup_restore_sub, backup_restore_service)
            .await
    });

    let backup_status_handle = tokio::spawn(async move {
        backup::handle_status(client_backup_status, backup_status_sub, backup_status_service).await
    });

    let backup_test_handle = tokio::spawn(async move {
        backup::handle_test(client_backup_test, backup_test_sub, backup_test_service).await
    });

    // Export handlers
    let export_locations_handle = tokio::spawn(async move {
        export::handle_locations(
            client_export_locations,
            export_locations_sub,
            pool_export_locations,
        )
        .await
    });

    let export_history_handle = tokio::spawn(async move {
        export::handle_history(client_export_history, export_history_sub, pool_export_history)
            .await
    });

    let export_document_handle = tokio::spawn(async move {
        export::handle_document(client_export_document, export_document_sub, pool_export_document)
            .await
    });

    let export_bundle_handle = tokio::spawn(async move {
        export::handle_bundle(client_export_bundle, export_bundle_sub, pool_export_bundle).await
    });

    info!("All handlers started");

    // A handler finishing means its subscription died; log and exit so the
    // supervisor can restart the worker.
    tokio::select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        // Auth handlers
        result = auth_login_handle => {
            error!("Auth login handler finished: {:?}", result);
        }
        result = auth_logout_handle => {
            error!("Auth logout handler finished: {:?}", result);
        }
        result = auth_history_handle => {
            error!("Auth history handler finished: {:?}", result);
        }
        result = auth_clear_handle => {
            error!("Auth clear-log handler finished: {:?}", result);
        }
        // Location handlers
        result = location_list_handle => {
            error!("Location list handler finished: {:?}", result);
        }
        result = location_get_handle => {
            error!("Location get handler finished: {:?}", result);
        }
        result = location_create_handle => {
            error!("Location create handler finished: {:?}", result);
        }
        result = location_update_handle => {
            error!("Location update handler finished: {:?}", result);
        }
        result = location_delete_handle => {
            error!("Location delete handler finished: {:?}", result);
        }
        result = location_bulk_save_handle => {
            error!("Location bulk-save handler finished: {:?}", result);
        }
        result = location_import_handle => {
            error!("Location import handler finished: {:?}", result);
        }
        // Municipality handlers
        result = municipality_list_handle => {
            error!("Municipality list handler finished: {:?}", result);
        }
        result = municipality_get_handle => {
            error!("Municipality get handler finished: {:?}", result);
        }
        result = municipality_import_handle => {
            error!("Municipality import handler finished: {:?}", result);
        }
        // Brand handlers
        result = brand_create_handle => {
            error!("Brand create handler finished: {:?}", result);
        }
        result = brand_list_handle => {
            error!("Brand list handler finished: {:?}", result);
        }
        result = brand_delete_handle => {
            error!("Brand delete handler finished: {:?}", result);
        }
        // Work order handlers
        result = wo_create_handle => {
            error!("Work order create handler finished: {:?}", result);
        }
        result = wo_list_handle => {
            error!("Work order list handler finished: {:?}", result);
        }
        result = wo_get_handle => {
            error!("Work order get handler finished: {:?}", result);
        }
        result = wo_update_handle => {
            error!("Work order update handler finished: {:?}", result);
        }
        result = wo_delete_rows_handle => {
            error!("Work order delete-rows handler finished: {:?}", result);
        }
        result = wo_delete_handle => {
            error!("Work order delete handler finished: {:?}", result);
        }
        result = wo_complete_handle => {
            error!("Work order complete handler finished: {:?}", result);
        }
        result = route_distance_handle => {
            error!("Route distance handler finished: {:?}", result);
        }
        // History handlers
        result = history_list_handle => {
            error!("History list handler finished: {:?}", result);
        }
        result = history_delete_rows_handle => {
            error!("History delete-rows handler finished: {:?}", result);
        }
        result = history_clear_handle => {
            error!("History clear handler finished: {:?}", result);
        }
        result = report_activity_handle => {
            error!("Activity report handler finished: {:?}", result);
        }
        // Geocode handlers
        result = geocode_pending_handle => {
            error!("Geocode pending handler finished: {:?}", result);
        }
        result = geocode_run_handle => {
            error!("Geocode run handler finished: {:?}", result);
        }
        // Backup handlers
        result = backup_run_handle => {
            error!("Backup run handler finished: {:?}", result);
        }
        result = backup_restore_handle => {
            error!("Backup restore handler finished: {:?}", result);
        }
        result = backup_status_handle => {
            error!("Backup status handler finished: {:?}", result);
        }
        result = backup_test_handle => {
            error!("Backup test handler finished: {:?}", result);
        }
        // Export handlers
        result = export_locations_handle => {
            error!("Export locations handler finished: {:?}", result);
        }
        result = export_history_handle => {
            error!("Export history handler finished: {:?}", result);
        }
        result = export_document_handle => {
            error!("Export document handler finished: {:?}", result);
        }
        result = export_bundle_handle => {
            error!("Export bundle handler finished: {:?}", result);
        }
    }

    Ok(())
}
