mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quickpic_api::{AppState, AppStateInner};
use quickpic_core::{AuthConfig, MemoryStore, Stores};
use quickpic_db::Database;

use crate::config::{Backend, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickpic=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let stores = match config.backend {
        Backend::Sqlite => Stores::from_backend(Arc::new(Database::open(&config.db_path)?)),
        Backend::Memory => {
            info!("Using in-memory backend; all data is lost on shutdown");
            Stores::from_backend(Arc::new(MemoryStore::new()))
        }
    };

    let state: AppState = Arc::new(AppStateInner::new(
        stores,
        AuthConfig::new(config.jwt_secret.clone()),
    ));

    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        config.message_retention,
        config.cleanup_interval_secs,
    ));

    let app = quickpic_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("QuickPic server listening on {}", addr);
    match config.message_retention {
        Some(window) => info!("Undelivered messages expire after {} hours", window.num_hours()),
        None => info!("Undelivered messages are kept until acknowledged"),
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
