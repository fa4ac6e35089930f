//! Feed handler: GET /rss

use crate::api::AppState;
use crate::render;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;

/// Content type of the rendered feed
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

/// GET /rss - The store rendered as an RSS feed
///
/// Rendered fresh on every request. Store failures degrade to an empty feed, never to
/// an error response.
pub async fn rss_feed(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let base_url = state.base_url(host);

    tracing::debug!(base_url = %base_url, "Rendering feed");
    let rendered_at = Utc::now();
    let body = render::render(&state.mirror.store, &base_url, rendered_at).await;

    let mut response = body.into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(RSS_CONTENT_TYPE),
    );
    if let Ok(last_modified) =
        HeaderValue::from_str(&rendered_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    {
        response_headers.insert(header::LAST_MODIFIED, last_modified);
    }
    response
}
