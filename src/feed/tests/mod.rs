use super::*;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>Test Feed</title>
        <link>https://example.com</link>
        <description>Test RSS Feed</description>
        <item>
            <title>Ubuntu 24.04 Desktop</title>
            <link>https://example.com/dl/ubuntu-24.04.torrent</link>
            <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
        </item>
        <item>
            <title>Details page</title>
            <link>https://example.com/details?id=2</link>
        </item>
        <item>
            <title>No link at all</title>
        </item>
    </channel>
</rss>"#;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Test Atom Feed</title>
    <id>https://example.com/atom</id>
    <updated>2024-01-01T12:00:00Z</updated>
    <entry>
        <title>Debian 12 netinst</title>
        <id>entry-1</id>
        <updated>2024-01-02T12:00:00Z</updated>
        <published>2024-01-01T10:00:00Z</published>
        <link href="https://example.com/debian-12.torrent" rel="enclosure"/>
    </entry>
    <entry>
        <title>Fedora 40</title>
        <id>entry-2</id>
        <updated>2024-01-02T14:30:00Z</updated>
    </entry>
</feed>"#;

fn test_client() -> FeedClient {
    FeedClient::new(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
    )
}

#[test]
fn test_parse_rss_feed() {
    let items = parse_feed(RSS_FEED.as_bytes()).expect("Failed to parse RSS");

    assert_eq!(items.len(), 3, "Should parse 3 items");

    assert_eq!(items[0].title, "Ubuntu 24.04 Desktop");
    assert_eq!(
        items[0].link.as_deref(),
        Some("https://example.com/dl/ubuntu-24.04.torrent")
    );
    assert_eq!(
        items[0].published_at.map(|d| d.to_rfc3339()),
        Some("2024-01-01T12:00:00+00:00".to_string())
    );

    assert_eq!(items[1].link.as_deref(), Some("https://example.com/details?id=2"));
    assert!(items[1].published_at.is_none());

    assert_eq!(items[2].title, "No link at all");
    assert!(items[2].link.is_none());
}

#[test]
fn test_parse_atom_feed() {
    let items = parse_feed(ATOM_FEED.as_bytes()).expect("Failed to parse Atom");

    assert_eq!(items.len(), 2, "Should parse 2 entries");

    assert_eq!(items[0].title, "Debian 12 netinst");
    assert_eq!(
        items[0].link.as_deref(),
        Some("https://example.com/debian-12.torrent")
    );
    // published wins over updated
    assert_eq!(
        items[0].published_at.map(|d| d.to_rfc3339()),
        Some("2024-01-01T10:00:00+00:00".to_string())
    );

    assert_eq!(items[1].title, "Fedora 40");
    assert!(items[1].link.is_none());
    assert_eq!(
        items[1].published_at.map(|d| d.to_rfc3339()),
        Some("2024-01-02T14:30:00+00:00".to_string())
    );
}

#[test]
fn test_parse_invalid_feed() {
    let result = parse_feed(b"This is not XML at all!");
    assert!(
        matches!(result, Err(Error::FeedParse(_))),
        "garbage should be a parse error, got {:?}",
        result
    );
}

#[tokio::test]
async fn test_fetch_feed_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(RSS_FEED),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let items = test_client()
        .fetch(&format!("{}/feed.xml", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_fetch_feed_http_error_is_retrieval_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = test_client()
        .fetch(&format!("{}/feed.xml", mock_server.uri()))
        .await;

    match result {
        Err(Error::FeedRetrieval(msg)) => assert!(msg.contains("500"), "message: {}", msg),
        other => panic!("Expected FeedRetrieval error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_feed_unparseable_body_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let result = test_client()
        .fetch(&format!("{}/feed.xml", mock_server.uri()))
        .await;

    assert!(matches!(result, Err(Error::FeedParse(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_fetch_feed_connection_refused_is_retrieval_error() {
    // Bind then drop a listener so the port is (very likely) closed
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = test_client()
        .fetch(&format!("http://127.0.0.1:{}/feed.xml", port))
        .await;

    assert!(matches!(result, Err(Error::FeedRetrieval(_))), "got {:?}", result);
}
