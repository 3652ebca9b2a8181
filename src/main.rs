use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::Method;
use bookmarked::config::{Backend, Cli, Config, default_config_dir, default_config_path};
use bookmarked::handler::AppState;
use bookmarked::routes::routes;
use bookmarked::service::Library;
use bookmarked::store::{EntityStore, FileStore, MemoryStore, SqlStore};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

/// Opens the configured store. Replica sync is started for libsql replicas.
async fn open_store(
    cfg: &Config,
    data_dir: &std::path::Path,
    token: &CancellationToken,
) -> Result<Arc<dyn EntityStore>> {
    match cfg.app.backend {
        Backend::Sqlite => {
            let path = cfg.app.database_path(data_dir);
            let replica = cfg.app.replica();
            tracing::info!(path = ?path, "using sqlite store");
            let store = Arc::new(SqlStore::new(&path, replica.as_ref()).await?);
            if let Some(replica) = replica {
                spawn_replica_sync(store.clone(), replica.sync_interval_seconds, token.clone());
            }
            Ok(store as Arc<dyn EntityStore>)
        }
        Backend::File => {
            let path = cfg.app.storage_file_path(data_dir);
            tracing::info!(path = ?path, "using file store");
            let store = FileStore::open(&path).await?;
            Ok(Arc::new(store) as Arc<dyn EntityStore>)
        }
        Backend::Memory => {
            tracing::warn!("using in-memory store, data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn EntityStore>)
        }
    }
}

fn spawn_replica_sync(store: Arc<SqlStore>, interval_seconds: u64, token: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = store.sync().await {
                        tracing::warn!("failed to sync replica: {}", e);
                    }
                }
                _ = token.cancelled() => {
                    tracing::info!("replica sync task shutting down");
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!("bookmarked.svc starting");

    // An explicit --config must exist; the default one is optional.
    let (cfg, data_dir) = match args.config_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            let cfg = Config::new(&path.to_string_lossy()).unwrap_or_else(|e| {
                tracing::error!(error = %e, path = ?path, "failed to load config file");
                std::process::exit(1);
            });
            (cfg, dir)
        }
        None => {
            let path = default_config_path();
            let cfg = if path.exists() {
                Config::new(&path.to_string_lossy()).unwrap_or_else(|e| {
                    tracing::error!(error = %e, path = ?path, "failed to load config file");
                    std::process::exit(1);
                })
            } else {
                tracing::info!(path = ?path, "no config file, using defaults");
                Config::default()
            };
            (cfg, default_config_dir())
        }
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(error = %e, dir = ?data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    let cancellation_token = CancellationToken::new();
    let store = open_store(&cfg, &data_dir, &cancellation_token)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to setup store");
            std::process::exit(1);
        });
    let service = Arc::new(Library::new(store));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = routes().layer(cors).with_state(AppState { service });

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("bookmarked.svc running on {}", &address);
    let shutdown_token = cancellation_token.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl+c");
            }
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            shutdown_token.cancel();
        })
        .await;

    if let Err(err) = result {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }

    cancellation_token.cancel();
    tracing::info!("bookmarked.svc going off, graceful shutdown complete");
}
