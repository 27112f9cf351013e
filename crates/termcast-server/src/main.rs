mod config;
mod web;
mod workspaces;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use termcast_terminal::PtyManager;

use crate::config::Config;
use crate::web::{create_router, AppState};
use crate::workspaces::WorkspaceStore;
use crate::ws::ConnectionManager;

/// Share one PTY process with remote viewers over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "termcast-server", version)]
struct Args {
    /// Listen address, overriding TERMCAST_BIND.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("termcast_server=info,termcast_terminal=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let bind_addr = args.bind.unwrap_or(config.bind_addr);

    let manager = Arc::new(PtyManager::new(config.limits()));
    let connections = Arc::new(ConnectionManager::new(manager.queue()));
    let workspaces = Arc::new(WorkspaceStore::new(config.workspaces_file.clone()));
    let static_dir = config.static_dir.clone();

    let state = AppState {
        manager: Arc::clone(&manager),
        connections: Arc::clone(&connections),
        workspaces,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    if let Some(dir) = static_dir {
        if dir.is_dir() {
            tracing::info!(dir = %dir.display(), "serving static assets");
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        }
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "termcast server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Teardown order: kill the process first so the reader drains out,
    // then stop the broadcaster loop.
    let shutdown_manager = Arc::clone(&manager);
    if let Err(e) = tokio::task::spawn_blocking(move || shutdown_manager.shutdown()).await? {
        tracing::warn!("terminal shutdown was incomplete: {e}");
    }
    connections.shutdown().await;

    Ok(())
}
