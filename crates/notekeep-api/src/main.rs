//! notekeep-api - HTTP API server for notekeep

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notekeep_api::config::{LogConfig, ServerConfig, StorageBackendKind};
use notekeep_api::services::NoteService;
use notekeep_api::{router, AppState};
use notekeep_db::{create_pool, log_pool_metrics, Database, FilesystemBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let _log_guard = init_tracing(&config.log);

    let notes = match config.storage_backend {
        StorageBackendKind::Memory => {
            warn!(
                subsystem = "startup",
                "Using in-memory storage; notes are lost on restart"
            );
            NoteService::in_memory()
        }
        StorageBackendKind::Postgres => {
            let backend = FilesystemBackend::new(&config.file_storage_path);
            backend.validate().await.map_err(|e| {
                anyhow::anyhow!(
                    "File storage at '{}' is not usable: {}",
                    config.file_storage_path,
                    e
                )
            })?;
            info!(
                subsystem = "startup",
                path = %config.file_storage_path,
                "File storage validated"
            );

            let pool = create_pool(&config.database_url, config.db_max_connections).await?;
            let db = Database::new(pool, backend);
            db.migrate().await?;
            log_pool_metrics(&db.pool);

            NoteService::new(Arc::new(db.notes.clone()), Arc::new(db.attachments.clone()))
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let storage = config.storage_backend.as_str();
    let state = AppState::new(notes, config)?;
    let app = router(state);

    info!(subsystem = "startup", %addr, storage, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(subsystem = "startup", "Server stopped");
    Ok(())
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter
fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notekeep_api=debug,notekeep_db=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log.file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("notekeep-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log.json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // No ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log.ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log.json {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log.ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = if log.json { "json" } else { "text" },
        log_file = log.file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(subsystem = "startup", error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(subsystem = "startup", "Shutdown signal received");
}
