//! Error types for torrent-mirror
//!
//! Errors are grouped by how far they reach:
//! - configuration errors stop the process before it serves anything
//! - feed errors abort a single synchronization pass
//! - extraction ([`ExtractError`]), download and store errors skip a single feed item
//!
//! None of these are ever rendered into an HTTP response body.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for torrent-mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-mirror
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment variable that caused the error (e.g., "RSSURL")
        key: Option<String>,
    },

    /// The source feed could not be retrieved (transport error or non-success status)
    #[error("failed to retrieve feed: {0}")]
    FeedRetrieval(String),

    /// The source feed was retrieved but is neither RSS nor Atom
    #[error("failed to parse feed: {0}")]
    FeedParse(String),

    /// Downloading a torrent file failed before anything was stored
    #[error("download of {url} failed: {reason}")]
    Download {
        /// The URL that was requested
        url: String,
        /// What went wrong (transport error, HTTP status, truncated body)
        reason: String,
    },

    /// A torrent file exceeded the configured size limit while downloading
    #[error("{name} exceeds the {limit} byte size limit")]
    TooLarge {
        /// File name the download was destined for
        name: String,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),
}

/// Reasons a feed item is not turned into a download
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The item's link does not end in `.torrent` (or the item has no link)
    #[error("not a torrent link: {link:?}")]
    NotTorrent {
        /// The offending link, empty when the item had none
        link: String,
    },

    /// The item's link looks like a torrent link but is not a valid URL
    #[error("invalid URL {link:?}: {reason}")]
    InvalidUrl {
        /// The link as it appeared in the feed
        link: String,
        /// Parser error message
        reason: String,
    },

    /// Neither the URL nor the item title yields a usable file name
    #[error("no usable file name for {link:?}")]
    EmptyName {
        /// The link the name was derived from
        link: String,
    },
}

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file with this name is already present in the store
    #[error("{name} already exists in the store")]
    AlreadyExists {
        /// The file name that collided
        name: String,
    },

    /// The name is not a single, safe path component
    #[error("invalid file name {name:?}")]
    InvalidName {
        /// The rejected name
        name: String,
    },

    /// Underlying file system operation failed
    #[error("{operation} {path}: {source}")]
    Io {
        /// What was being attempted (e.g., "create", "read directory")
        operation: &'static str,
        /// The path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl Error {
    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
