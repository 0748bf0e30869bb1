//! Retail banking gateway
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌─────────────┐    ┌──────────────────┐
//! │ Gateway  │───▶│  Funding  │───▶│ Coordinator │───▶│ Accounts / Cards │
//! │  (HTTP)  │    │ (precheck)│    │    (FSM)    │    │   (ledger rows)  │
//! └──────────┘    └───────────┘    └─────────────┘    └──────────────────┘
//!                                         ▲
//!                                  Recovery worker
//! ```
//!
//! Usage: `retail_banking [--env dev|test|prod]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use retail_banking::admin::listen_user_changes;
use retail_banking::backend::Backend;
use retail_banking::config::AppConfig;
use retail_banking::db::Database;
use retail_banking::gateway::{self, AppState};
use retail_banking::memory::InMemoryBank;
use retail_banking::transfer::RecoveryWorker;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = retail_banking::logging::init_logging(&app_config);

    tracing::info!("Starting retail banking gateway in {} mode", env);

    let (backend, db) = match app_config.postgres_url {
        Some(ref url) => {
            let db = Database::connect_with(url, app_config.postgres_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            tracing::info!("PostgreSQL connected, migrations applied");

            let backend = Backend::postgres(&db);
            let feed = backend.user_feed.clone();
            let pool = db.pool().clone();
            tokio::spawn(async move {
                if let Err(e) = listen_user_changes(pool, feed).await {
                    tracing::error!(error = %e, "User change listener stopped");
                }
            });
            (backend, Some(Arc::new(db)))
        }
        None => {
            tracing::warn!("No postgres_url configured, using the in-memory backend");
            (Backend::in_memory(Arc::new(InMemoryBank::new())), None)
        }
    };

    let state = Arc::new(AppState::build(
        &backend,
        db,
        &app_config.auth,
        &app_config.transfer,
    ));

    // Admin directory: subscribe, snapshot, then follow the change feed
    let (loaded, _) = state
        .directory
        .clone()
        .start(&backend.user_feed)
        .await
        .context("Failed to load user directory")?;
    tracing::info!(users = loaded, "User directory loaded");

    let worker = RecoveryWorker::new(state.coordinator().clone(), app_config.transfer.worker());
    tokio::spawn(async move {
        worker.run().await;
    });

    let sessions = state.sessions.clone();
    let purge_interval = Duration::from_secs(app_config.auth.purge_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired sessions purged");
            }
        }
    });

    gateway::run_server(&app_config.gateway, state).await
}
