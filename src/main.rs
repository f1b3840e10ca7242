use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use upload_relay::config::AppConfig;
use upload_relay::services::{Notifier, SqliteSessionStore, UploadService, notifier, sweep};
use upload_relay::state::AppState;
use upload_relay::storage::FsBackend;
use upload_relay::{MIGRATOR, routes};

/// Notifications queued but not yet drained before new ones are dropped.
const NOTIFICATION_QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-relay with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    if !db_url.contains(":memory:") {
        // Create parent directory if needed
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }

        // SQLx will not create the database file itself; make sure it exists.
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(db_path)?;
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Run migrations ---
    MIGRATOR.run(&*db).await?;
    tracing::debug!("Database schema is up to date");

    // --- Initialize core services ---
    let sessions = Arc::new(SqliteSessionStore::new(db.clone()));
    let backend = Arc::new(FsBackend::new(&cfg.storage_dir));
    let (notifier, notifications) = Notifier::channel(NOTIFICATION_QUEUE_DEPTH);
    let uploads = UploadService::new(sessions, backend, notifier, cfg.public_base_url.clone());

    // --- Background tasks ---
    tokio::spawn(notifier::run_drain(notifications));
    if cfg.sweep_interval_secs > 0 {
        sweep::spawn(
            uploads.clone(),
            Duration::from_secs(cfg.sweep_interval_secs),
        );
    } else {
        tracing::warn!("Expiry sweep disabled; abandoned uploads will only expire passively");
    }

    // --- Build router ---
    let state = AppState {
        uploads,
        db,
        storage_dir: cfg.storage_dir.clone().into(),
    };
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
