//! HTTP server module
//!
//! Serves the rendered feed and the stored torrent files.

use crate::render::FILES_ROUTE;
use crate::{Result, TorrentMirror};
use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the router with all route definitions
///
/// # Routes
///
/// - `GET /rss` - The store rendered as an RSS feed
/// - `GET /files/<name>` - Raw bytes of a stored torrent (404 when absent)
/// - `GET /health` - Health check
///
/// The `/files` prefix is shared with [`render::file_url`](crate::render::file_url),
/// which builds the links the feed points at.
pub fn create_router(mirror: Arc<TorrentMirror>) -> Router {
    let files = ServeDir::new(mirror.store.root());
    let state = AppState::new(mirror);

    Router::new()
        .route("/rss", get(routes::rss_feed))
        .route("/health", get(routes::health_check))
        .nest_service(FILES_ROUTE, files)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the mirror's shutdown token is cancelled, then stops accepting
/// connections and lets in-flight requests finish.
///
/// # Example
///
/// ```no_run
/// use torrent_mirror::{Config, TorrentMirror};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::new("https://example.com/rss", "*/15 * * * *");
/// let mirror = Arc::new(TorrentMirror::new(config).await?);
///
/// // Serve until shutdown
/// torrent_mirror::api::start_api_server(mirror).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(mirror: Arc<TorrentMirror>) -> Result<()> {
    let bind_address = mirror.config.server.bind_address;
    let shutdown = mirror.shutdown_token();

    tracing::info!(address = %bind_address, "Starting HTTP server");

    let app = create_router(mirror);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::Server(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
