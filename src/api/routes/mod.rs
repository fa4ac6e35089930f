//! Route handlers for the HTTP server
//!
//! - `feed`: the rendered RSS feed
//! - `system`: health
//!
//! Stored files are served by `tower_http`'s `ServeDir`, mounted in [`create_router`](super::create_router).

mod feed;
mod system;

pub use feed::*;
pub use system::*;
