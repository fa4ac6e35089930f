//! # torrent-mirror
//!
//! Mirrors the `.torrent` links of a remote RSS (or Atom) feed into a local directory
//! and republishes that directory as an RSS feed of its own.
//!
//! A synchronization pass fetches the source feed, keeps items whose link ends in
//! `.torrent`, and downloads each file whose name is not in the store yet. Passes run
//! once at startup and then on a cron cadence. The HTTP server renders the store on
//! every `GET /rss` and serves the raw files under `GET /files/<name>`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use torrent_mirror::{Config, TorrentMirror, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("https://example.com/rss", "*/15 * * * *");
//!     let mirror = Arc::new(TorrentMirror::new(config).await?);
//!
//!     // Sync on startup and per cron tick, serve until SIGTERM/SIGINT
//!     run_with_shutdown(mirror).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP server serving the rendered feed and stored files
pub mod api;
/// Configuration read from the environment
pub mod config;
/// Error types
pub mod error;
/// Torrent link extraction from feed items
pub mod extract;
/// Source feed retrieval and parsing
pub mod feed;
/// RSS rendering of the store
pub mod render;
/// Cron-driven pass scheduling
pub mod scheduler;
/// Directory-backed torrent store
pub mod store;
/// Synchronization passes
pub mod synchronizer;


pub use config::{Config, HttpConfig, ServerConfig, StoreConfig};
pub use error::{Error, ExtractError, Result, StoreError};
pub use extract::{TorrentLink, extract};
pub use feed::{FeedClient, FeedItem};
pub use scheduler::SyncScheduler;
pub use store::{Store, StoredFile};
pub use synchronizer::{SyncReport, Synchronizer};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Process-wide context shared by the scheduler and the HTTP server
///
/// Holds the configuration, the store and the synchronizer. Cloning the inner `Arc`s
/// is how each subsystem gets its handle.
pub struct TorrentMirror {
    /// Configuration the mirror was started with
    pub config: Arc<Config>,
    /// Directory of downloaded torrent files
    pub store: Store,
    /// Runs synchronization passes against the configured feed
    pub synchronizer: Arc<Synchronizer>,
    shutdown: CancellationToken,
}

impl TorrentMirror {
    /// Create a new mirror
    ///
    /// Creates the store directory when missing and builds the HTTP client used for
    /// both the feed and the torrent downloads.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::open(&config.store.dir).await?;

        let http_client = reqwest::Client::builder()
            .timeout(config.http.fetch_timeout)
            .connect_timeout(config.http.connect_timeout)
            .user_agent(config.http.user_agent.clone())
            .build()?;

        let synchronizer = Arc::new(Synchronizer::new(
            http_client,
            store.clone(),
            config.store.max_file_bytes,
        ));

        tracing::info!(
            feed = %config.feed_url,
            crontab = %config.crontab,
            dir = %config.store.dir.display(),
            "Torrent mirror initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            synchronizer,
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the scheduler on its own task
    ///
    /// The first pass runs immediately; later passes follow the configured crontab.
    pub fn spawn_scheduler(&self) -> Result<JoinHandle<()>> {
        let schedule = scheduler::parse_schedule(&self.config.crontab)?;
        let scheduler = SyncScheduler::new(
            schedule,
            self.synchronizer.clone(),
            self.config.feed_url.clone(),
            self.shutdown.child_token(),
        );
        Ok(tokio::spawn(scheduler.run()))
    }

    /// Token cancelled when the mirror shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the scheduler and the HTTP server
    ///
    /// Passes already running finish on their own; their temporary files never become
    /// visible in the store if the process exits first.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down torrent mirror");
        self.shutdown.cancel();
    }
}

/// Run the mirror until a termination signal arrives.
///
/// Starts the scheduler and the HTTP server, waits for SIGTERM/SIGINT (Ctrl+C on
/// non-unix platforms) or for the server to stop on its own, then shuts everything
/// down.
///
/// # Errors
/// Returns the server's error when it fails to bind or stops unexpectedly.
pub async fn run_with_shutdown(mirror: Arc<TorrentMirror>) -> Result<()> {
    let scheduler = mirror.spawn_scheduler()?;

    // The server stops once the shutdown token is cancelled
    let signals = tokio::spawn({
        let mirror = mirror.clone();
        async move {
            wait_for_signal().await;
            mirror.shutdown();
        }
    });

    let result = match tokio::spawn(api::start_api_server(mirror.clone())).await {
        Ok(result) => result,
        Err(e) => Err(Error::Server(format!("server task failed: {}", e))),
    };

    // Also reached when the server stops on its own
    mirror.shutdown();
    signals.abort();
    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "Scheduler task ended abnormally");
    }

    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
