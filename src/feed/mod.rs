//! Source feed retrieval.
//!
//! Fetches the configured feed over HTTP and turns it into a list of [`FeedItem`]s.
//! RSS 2.0 is tried first; if the document is not RSS it is parsed as Atom.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// An item from the source feed, as consumed by the link extractor
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedItem {
    /// Item title (empty when the feed omits it)
    pub title: String,

    /// Item link/URL
    pub link: Option<String>,

    /// Publication date, when the feed provides a parseable one
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetches and parses the source feed
#[derive(Clone, Debug)]
pub struct FeedClient {
    http_client: reqwest::Client,
}

impl FeedClient {
    /// Create a feed client on top of a shared HTTP client
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Fetch the feed at `url` and return its items in document order
    ///
    /// # Errors
    /// - [`Error::FeedRetrieval`] if the request fails or the server does not answer 2xx
    /// - [`Error::FeedParse`] if the body is neither RSS nor Atom
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        debug!(url = %url, "Fetching source feed");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::FeedRetrieval(format!("{}: {}", url, e)))?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FeedRetrieval(format!(
                "{} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| Error::FeedRetrieval(format!("failed to read body of {}: {}", url, e)))?;

        parse_feed(&content)
    }
}

/// Parse a feed document, trying RSS first and Atom second
pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedItem>> {
    match parse_as_rss(content) {
        Ok(items) => {
            debug!("Parsed feed as RSS, found {} items", items.len());
            Ok(items)
        }
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            match parse_as_atom(content) {
                Ok(items) => {
                    debug!("Parsed feed as Atom, found {} items", items.len());
                    Ok(items)
                }
                Err(atom_err) => Err(Error::FeedParse(format!(
                    "not RSS ({}) and not Atom ({})",
                    rss_err, atom_err
                ))),
            }
        }
    }
}

fn parse_as_rss(content: &[u8]) -> std::result::Result<Vec<FeedItem>, rss::Error> {
    let channel = rss::Channel::read_from(content)?;

    Ok(channel
        .items()
        .iter()
        .map(|item| FeedItem {
            title: item.title().unwrap_or("").to_string(),
            link: item.link().map(|l| l.trim().to_string()),
            published_at: item.pub_date().and_then(|date| {
                DateTime::parse_from_rfc2822(date)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        })
        .collect())
}

fn parse_as_atom(content: &[u8]) -> std::result::Result<Vec<FeedItem>, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content)?;

    Ok(feed
        .entries()
        .iter()
        .map(|entry| {
            // Prefer published, fall back to updated
            let published_at = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .to_rfc3339();

            FeedItem {
                title: entry.title().as_str().to_string(),
                link: entry.links().first().map(|link| link.href().trim().to_string()),
                published_at: DateTime::parse_from_rfc3339(&published_at)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        })
        .collect())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
