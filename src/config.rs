//! Configuration types for torrent-mirror
//!
//! Everything is read from the environment. `RSSURL` and `CRONTAB` are required; the
//! rest fall back to defaults suited to running in a container.

use crate::error::{Error, Result};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Source feed URL (required)
pub const ENV_FEED_URL: &str = "RSSURL";
/// Cron expression for the synchronization cadence (required)
pub const ENV_CRONTAB: &str = "CRONTAB";
/// Store directory
pub const ENV_TORRENT_DIR: &str = "TORRENT_DIR";
/// HTTP listen address
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";
/// Public base URL used in rendered links
pub const ENV_PUBLIC_URL: &str = "PUBLIC_URL";
/// Per-request timeout in seconds
pub const ENV_FETCH_TIMEOUT: &str = "FETCH_TIMEOUT_SECS";
/// Maximum size of a single torrent file in bytes
pub const ENV_MAX_TORRENT_BYTES: &str = "MAX_TORRENT_BYTES";

/// Store settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding downloaded torrents (default: "/torrent_files")
    pub dir: PathBuf,

    /// Largest torrent file accepted, in bytes (default: 10 MiB)
    pub max_file_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_torrent_dir(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// HTTP server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on (default: 0.0.0.0:8080)
    pub bind_address: SocketAddr,

    /// Base URL for links in the rendered feed
    ///
    /// When unset, links are built from the request's `Host` header.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_url: None,
        }
    }
}

/// Outbound HTTP settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    /// Total timeout for one request (default: 30 seconds)
    pub fetch_timeout: Duration,

    /// Connection timeout (default: 10 seconds)
    pub connect_timeout: Duration,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration for TorrentMirror
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Feed to mirror
    pub feed_url: String,

    /// Cron expression driving synchronization passes
    pub crontab: String,

    /// Store settings
    pub store: StoreConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,
}

impl Config {
    /// Configuration with the given feed and cadence and defaults for everything else
    pub fn new(feed_url: impl Into<String>, crontab: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            crontab: crontab.into(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
            http: HttpConfig::default(),
        }
    }

    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the offending variable when a required value is
    /// missing or any value fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let feed_url = get(ENV_FEED_URL)
            .ok_or_else(|| Error::config(format!("{} must be set", ENV_FEED_URL), ENV_FEED_URL))?;
        url::Url::parse(&feed_url).map_err(|e| {
            Error::config(
                format!("{} is not a valid URL ({}): {}", ENV_FEED_URL, feed_url, e),
                ENV_FEED_URL,
            )
        })?;

        let crontab = get(ENV_CRONTAB)
            .ok_or_else(|| Error::config(format!("{} must be set", ENV_CRONTAB), ENV_CRONTAB))?;
        crate::scheduler::parse_schedule(&crontab)?;

        let mut config = Config::new(feed_url, crontab);

        if let Some(dir) = get(ENV_TORRENT_DIR) {
            config.store.dir = PathBuf::from(dir);
        }
        if let Some(max) = get(ENV_MAX_TORRENT_BYTES) {
            config.store.max_file_bytes = parse_value(ENV_MAX_TORRENT_BYTES, &max)?;
        }
        if let Some(addr) = get(ENV_BIND_ADDRESS) {
            config.server.bind_address = parse_value(ENV_BIND_ADDRESS, &addr)?;
        }
        if let Some(public_url) = get(ENV_PUBLIC_URL) {
            url::Url::parse(&public_url).map_err(|e| {
                Error::config(
                    format!("{} is not a valid URL: {}", ENV_PUBLIC_URL, e),
                    ENV_PUBLIC_URL,
                )
            })?;
            config.server.public_url = Some(public_url.trim_end_matches('/').to_string());
        }
        if let Some(secs) = get(ENV_FETCH_TIMEOUT) {
            config.http.fetch_timeout = Duration::from_secs(parse_value(ENV_FETCH_TIMEOUT, &secs)?);
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::config(format!("invalid {} {:?}: {}", key, value, e), key))
}

fn default_torrent_dir() -> PathBuf {
    PathBuf::from("/torrent_files")
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("torrent-mirror/{}", env!("CARGO_PKG_VERSION"))
}
