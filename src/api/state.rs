//! Application state for the HTTP server

use crate::TorrentMirror;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The process-wide mirror context
    pub mirror: Arc<TorrentMirror>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(mirror: Arc<TorrentMirror>) -> Self {
        Self { mirror }
    }

    /// Base URL for links in the rendered feed
    ///
    /// The configured public URL wins; otherwise the request's `Host` header is used,
    /// and the bind address when the request carries none.
    pub fn base_url(&self, host: Option<&str>) -> String {
        let server = &self.mirror.config.server;
        match (&server.public_url, host) {
            (Some(public_url), _) => public_url.trim_end_matches('/').to_string(),
            (None, Some(host)) => format!("http://{}", host),
            (None, None) => format!("http://{}", server.bind_address),
        }
    }
}
