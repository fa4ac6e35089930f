//! Synchronization passes: source feed -> torrent store.
//!
//! A pass fetches the feed once and then handles every item on its own:
//! 1. Resolve the item to a torrent link (rejected items are skipped)
//! 2. Skip it if the store already holds a file with that name
//! 3. Download it into a [`PendingFile`](crate::store::PendingFile) and commit
//!
//! Failing to fetch or parse the feed ends the pass before anything is written.
//! Failing on one item only skips that item. Nothing is retried within a pass; an item
//! that failed is simply attempted again by the next pass, since it never reached the
//! store.

use crate::error::{Error, Result};
use crate::extract::{TorrentLink, extract};
use crate::feed::{FeedClient, FeedItem};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Counters describing one completed synchronization pass
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
    /// Items found in the feed
    pub items: usize,
    /// Items downloaded into the store by this pass
    pub downloaded: usize,
    /// Items skipped because the store already had them
    pub already_present: usize,
    /// Items that do not point at a torrent file
    pub rejected: usize,
    /// Items whose download or write failed
    pub failed: usize,
}

/// What happened to a single feed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Downloaded,
    AlreadyPresent,
    Rejected,
    Failed,
}

/// Runs synchronization passes against a store
///
/// At most one pass runs at a time. [`run`](Synchronizer::run) waits for a pass in
/// flight to finish; [`try_run`](Synchronizer::try_run) gives up immediately instead.
#[derive(Debug)]
pub struct Synchronizer {
    http_client: reqwest::Client,
    feed_client: FeedClient,
    store: Store,
    max_file_bytes: u64,
    run_lock: Mutex<()>,
    last_report: RwLock<Option<SyncReport>>,
}

impl Synchronizer {
    /// Create a synchronizer writing into `store`
    ///
    /// `max_file_bytes` bounds a single download; anything larger is discarded.
    pub fn new(http_client: reqwest::Client, store: Store, max_file_bytes: u64) -> Self {
        Self {
            feed_client: FeedClient::new(http_client.clone()),
            http_client,
            store,
            max_file_bytes,
            run_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    /// Run one pass, waiting for any pass already in flight
    ///
    /// # Errors
    /// Returns [`Error::FeedRetrieval`] or [`Error::FeedParse`] if the feed could not be
    /// loaded; item-level failures are counted in the report instead.
    pub async fn run(&self, feed_url: &str) -> Result<SyncReport> {
        let _guard = self.run_lock.lock().await;
        self.run_pass(feed_url).await
    }

    /// Run one pass unless another is in flight, in which case `Ok(None)` is returned
    pub async fn try_run(&self, feed_url: &str) -> Result<Option<SyncReport>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Ok(None);
        };
        self.run_pass(feed_url).await.map(Some)
    }

    /// Report of the most recent pass that got past fetching the feed
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    async fn run_pass(&self, feed_url: &str) -> Result<SyncReport> {
        let started_at = Utc::now();
        info!(url = %feed_url, "Starting synchronization pass");

        let items = match self.feed_client.fetch(feed_url).await {
            Ok(items) => items,
            Err(e) => {
                error!(url = %feed_url, error = %e, "Synchronization pass aborted");
                return Err(e);
            }
        };

        let mut report = SyncReport {
            started_at,
            finished_at: started_at,
            items: items.len(),
            downloaded: 0,
            already_present: 0,
            rejected: 0,
            failed: 0,
        };

        for item in &items {
            match self.process_item(item).await {
                ItemOutcome::Downloaded => report.downloaded += 1,
                ItemOutcome::AlreadyPresent => report.already_present += 1,
                ItemOutcome::Rejected => report.rejected += 1,
                ItemOutcome::Failed => report.failed += 1,
            }
        }

        report.finished_at = Utc::now();
        info!(
            url = %feed_url,
            items = report.items,
            downloaded = report.downloaded,
            already_present = report.already_present,
            rejected = report.rejected,
            failed = report.failed,
            "Synchronization pass finished"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    async fn process_item(&self, item: &FeedItem) -> ItemOutcome {
        let link = match extract(item) {
            Ok(link) => link,
            Err(e) => {
                info!(title = %item.title, reason = %e, "Skipping feed item");
                return ItemOutcome::Rejected;
            }
        };

        match self.store.exists(&link.file_name).await {
            Ok(true) => {
                debug!(name = %link.file_name, "Already in store, skipping");
                return ItemOutcome::AlreadyPresent;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(name = %link.file_name, error = %e, "Cannot check store, skipping item");
                return ItemOutcome::Failed;
            }
        }

        info!(name = %link.file_name, url = %link.download_url, "Downloading torrent");
        match self.download(&link).await {
            Ok(bytes) => {
                info!(name = %link.file_name, bytes, "Torrent saved");
                ItemOutcome::Downloaded
            }
            Err(e) => {
                warn!(name = %link.file_name, error = %e, "Torrent download failed");
                ItemOutcome::Failed
            }
        }
    }

    /// Download `link` into the store, returning the number of bytes written
    ///
    /// Every early return drops the pending file, which discards what was written.
    async fn download(&self, link: &TorrentLink) -> Result<u64> {
        let url = link.download_url.as_str();
        let download_error = |reason: String| Error::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .http_client
            .get(link.download_url.clone())
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status.as_u16())));
        }

        let too_large = || Error::TooLarge {
            name: link.file_name.clone(),
            limit: self.max_file_bytes,
        };
        if let Some(length) = response.content_length()
            && length > self.max_file_bytes
        {
            return Err(too_large());
        }

        let mut pending = self.store.create(&link.file_name).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_file_bytes {
                return Err(too_large());
            }
            pending.write(&chunk).await?;
        }

        pending.commit().await?;
        Ok(written)
    }
}
