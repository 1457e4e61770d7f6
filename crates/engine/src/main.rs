//! Build-world engine - Main entry point.
//!
//! Reconciles persisted world records against storage, then runs the idle
//! eviction loop while reading occupancy events from stdin until Ctrl-C.

use std::io::BufReader;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buildsys_engine::infrastructure::{
    authorization::GrantsFileAuthorization,
    clock::SystemClock,
    config::AppConfig,
    occupancy_feed,
    ports::{ClockPort, RoleSource},
    roles_file::JsonRoleSource,
    world_storage::DirectoryWorldStorage,
    world_store::SqliteWorldStore,
};
use buildsys_engine::use_cases::OccupancyListener;
use buildsys_engine::{App, Ports};

const OCCUPANCY_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary is usually run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buildsys_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting build-world engine");

    let config = AppConfig::from_env().context("Invalid configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    // World records
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db_path = config.database_path.display().to_string();
    tracing::info!("Opening world database at {}", db_path);
    let store = SqliteWorldStore::new(&db_path)
        .await
        .context("Failed to open world database")?;

    let storage = DirectoryWorldStorage::new(&config.worlds_dir)
        .await
        .context("Failed to open world storage")?;

    // Roles are required; grants may be absent
    let roles = JsonRoleSource::new(&config.roles_path)
        .load_roles()
        .await
        .context("Failed to load role definitions")?;
    tracing::info!(count = roles.len(), "Loaded role definitions");
    let auth = GrantsFileAuthorization::load(&config.grants_path)
        .await
        .context("Failed to load capability grants")?;

    let app = App::new(
        Ports {
            store: Arc::new(store),
            storage: Arc::new(storage),
            auth: Arc::new(auth),
            clock: clock.clone(),
        },
        roles,
        config.eviction,
        config.startup_timeout,
    );

    let report = app
        .reconcile()
        .await
        .context("Startup reconciliation failed")?;
    tracing::info!(
        retained = report.retained.len(),
        removed = report.removed.len(),
        loaded = report.loaded.len(),
        "World registry ready"
    );

    let cancel = CancellationToken::new();

    let eviction_handle = app.eviction.spawn(cancel.clone());

    let (events_tx, events_rx) = mpsc::channel(OCCUPANCY_CHANNEL_CAPACITY);
    let listener_handle =
        OccupancyListener::new(Arc::clone(&app.tracker)).spawn(events_rx, cancel.clone());

    let stdin_lines = occupancy_feed::read_lines_on_thread(
        BufReader::new(std::io::stdin()),
        OCCUPANCY_CHANNEL_CAPACITY,
    )
    .context("Failed to start occupancy feed reader")?;
    let feed_handle = tokio::spawn(occupancy_feed::forward_lines(
        stdin_lines,
        events_tx,
        clock.clone(),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    cancel.cancel();

    match feed_handle.await {
        Ok(count) => tracing::info!(count, "Occupancy feed finished"),
        Err(e) => tracing::warn!(error = %e, "Occupancy feed ended abnormally"),
    }
    if let Err(e) = eviction_handle.await {
        tracing::warn!(error = %e, "Eviction task ended abnormally");
    }
    if let Err(e) = listener_handle.await {
        tracing::warn!(error = %e, "Occupancy listener ended abnormally");
    }

    tracing::info!("Build-world engine stopped");
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
