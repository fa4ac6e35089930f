//! Torrent link extraction and file naming.
//!
//! Only an item's `link` is considered, and only when its path ends in `.torrent`.
//! Indirect links (detail pages, redirects, magnets) are rejected rather than chased.

use crate::error::ExtractError;
use crate::feed::FeedItem;
use url::Url;

/// File extension every stored torrent carries (compared case-insensitively)
pub const TORRENT_SUFFIX: &str = ".torrent";

/// A feed item resolved to a download URL and a local file name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TorrentLink {
    /// Name of the file in the store
    pub file_name: String,

    /// Where to download it from
    pub download_url: Url,
}

/// Returns true if `name` ends in `.torrent`, ignoring ASCII case
#[must_use]
pub fn has_torrent_suffix(name: &str) -> bool {
    name.len() >= TORRENT_SUFFIX.len()
        && name.is_char_boundary(name.len() - TORRENT_SUFFIX.len())
        && name[name.len() - TORRENT_SUFFIX.len()..].eq_ignore_ascii_case(TORRENT_SUFFIX)
}

/// Resolve a feed item to a torrent download
///
/// The file name is the last segment of the URL path (percent-decoded). When that
/// segment carries no name of its own, the item title is used instead, with spaces
/// turned into underscores and `.torrent` appended. The same item always yields
/// the same name.
///
/// # Errors
/// - [`ExtractError::NotTorrent`] if the item has no link or its path does not end in `.torrent`
/// - [`ExtractError::InvalidUrl`] if the link ends in `.torrent` but cannot be parsed
/// - [`ExtractError::EmptyName`] if no usable name can be derived
pub fn extract(item: &FeedItem) -> Result<TorrentLink, ExtractError> {
    let link = item.link.as_deref().map(str::trim).unwrap_or("");

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(e) if has_torrent_suffix(link) => {
            return Err(ExtractError::InvalidUrl {
                link: link.to_string(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            return Err(ExtractError::NotTorrent {
                link: link.to_string(),
            });
        }
    };

    if !has_torrent_suffix(url.path()) {
        return Err(ExtractError::NotTorrent {
            link: link.to_string(),
        });
    }

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let segment = urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let file_name = if is_nameless(&segment) {
        format!("{}{}", item.title.trim().replace(' ', "_"), TORRENT_SUFFIX)
    } else {
        segment
    };
    let file_name = sanitize_file_name(&file_name);

    if is_nameless(&file_name) {
        return Err(ExtractError::EmptyName {
            link: link.to_string(),
        });
    }

    Ok(TorrentLink {
        file_name,
        download_url: url,
    })
}

/// A segment is nameless when it is empty, a separator, or only the extension
fn is_nameless(segment: &str) -> bool {
    segment.is_empty()
        || segment == "/"
        || segment == "."
        || segment == ".."
        || segment.eq_ignore_ascii_case(TORRENT_SUFFIX)
}

/// Replace characters that would escape the store directory or break listings
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
