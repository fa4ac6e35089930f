//! Common test utilities for torrent-mirror integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use torrent_mirror::{Config, TorrentMirror};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bencoded body served for every mocked torrent
pub const TORRENT_BYTES: &[u8] = b"d8:announce30:http://tracker.example/announce4:infod4:name5:a.isoee";

/// Create a mirror for `feed_url` with its store in a fresh temp directory.
/// The tempdir must be kept alive for the duration of the test.
pub async fn create_mirror(feed_url: &str) -> (Arc<TorrentMirror>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut config = Config::new(feed_url, "0 * * * *");
    config.store.dir = temp_dir.path().join("torrent_files");
    config.server.bind_address = "127.0.0.1:0".parse().expect("valid address");

    let mirror = TorrentMirror::new(config)
        .await
        .expect("Failed to create mirror");
    (Arc::new(mirror), temp_dir)
}

/// RSS document with one item per (title, link) pair
pub fn rss_with_items(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| format!("<item><title>{}</title><link>{}</link></item>", title, link))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Source</title><link>http://source.example</link><description>Source feed</description>{}</channel></rss>"#,
        items
    )
}

/// Serve `body` as the source feed at `/feed.xml`
pub async fn mount_feed(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serve [`TORRENT_BYTES`] at `file_path`
pub async fn mount_torrent(server: &MockServer, file_path: &str) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(TORRENT_BYTES))
        .mount(server)
        .await;
}
