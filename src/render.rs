//! Renders the store as an RSS 2.0 feed.
//!
//! The feed is rebuilt from the directory listing on every request. Stored files carry
//! no publication time of their own, so every item is stamped with the render time:
//! the same file reports a new `pubDate` on each request.

use crate::store::{Store, StoredFile};
use chrono::{DateTime, Utc};
use rss::{Channel, Enclosure, Guid, Item};
use tracing::{error, warn};

/// Channel title of the rendered feed
pub const CHANNEL_TITLE: &str = "Torrent Files Feed";

/// Channel description of the rendered feed
pub const CHANNEL_DESCRIPTION: &str = "Torrent files saved in the container.";

/// MIME type advertised for enclosures
pub const TORRENT_MIME_TYPE: &str = "application/x-bittorrent";

/// Route prefix the HTTP layer serves stored files under
pub const FILES_ROUTE: &str = "/files";

/// Download URL of a stored file, as served by the HTTP layer
#[must_use]
pub fn file_url(base_url: &str, name: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        FILES_ROUTE,
        urlencoding::encode(name)
    )
}

/// Render the current store contents as an RSS document
///
/// Every item and the channel's `lastBuildDate` carry `rendered_at`. A store that
/// cannot be listed produces a valid feed with no items.
pub async fn render(store: &Store, base_url: &str, rendered_at: DateTime<Utc>) -> Vec<u8> {
    let files = match store.list().await {
        Ok(files) => files,
        Err(e) => {
            error!(error = %e, "Failed to list torrent store, rendering empty feed");
            Vec::new()
        }
    };

    let channel = build_channel(&files, base_url, rendered_at);
    match channel.write_to(Vec::new()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to serialize feed, rendering empty feed");
            build_channel(&[], base_url, rendered_at)
                .to_string()
                .into_bytes()
        }
    }
}

/// Build the output channel for a set of stored files
pub fn build_channel(files: &[StoredFile], base_url: &str, now: DateTime<Utc>) -> Channel {
    let base_url = base_url.trim_end_matches('/');
    let now = now.to_rfc2822();

    let mut channel = Channel::default();
    channel.set_title(CHANNEL_TITLE);
    channel.set_link(format!("{}/rss", base_url));
    channel.set_description(CHANNEL_DESCRIPTION);
    channel.set_last_build_date(now.clone());
    channel.set_generator(format!("torrent-mirror {}", env!("CARGO_PKG_VERSION")));
    channel.set_items(
        files
            .iter()
            .map(|file| build_item(file, base_url, &now))
            .collect::<Vec<_>>(),
    );
    channel
}

fn build_item(file: &StoredFile, base_url: &str, pub_date: &str) -> Item {
    let url = file_url(base_url, &file.name);

    let mut guid = Guid::default();
    guid.set_value(file.name.clone());
    guid.set_permalink(false);

    let mut enclosure = Enclosure::default();
    enclosure.set_url(url.clone());
    enclosure.set_length(file.size_bytes.to_string());
    enclosure.set_mime_type(TORRENT_MIME_TYPE);

    let mut item = Item::default();
    item.set_title(file.name.clone());
    item.set_link(url);
    item.set_guid(guid);
    item.set_pub_date(pub_date.to_string());
    item.set_description(format!("Downloaded torrent file: {}", file.name));
    item.set_enclosure(enclosure);
    item
}
