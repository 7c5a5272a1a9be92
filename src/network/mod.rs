//! Network layer for Hartrace
//!
//! Runs the recording proxy as an HTTP/1.1 server and forwards traffic
//! upstream with bounded concurrency.

mod client;
mod connection_pool;
mod server;

pub use client::{payload_bytes, HttpClient};
pub use connection_pool::ConnectionPool;
pub use server::ProxyServer;

/// Path prefix reserved for control endpoints
pub const CONTROL_PREFIX: &str = "/__hartrace/";

/// Navigation signal: `POST /__hartrace/navigate?url=<target>`
pub const NAVIGATE_PATH: &str = "/__hartrace/navigate";

/// Archive download: `GET /__hartrace/har`
pub const EXPORT_PATH: &str = "/__hartrace/har";

/// Upstream request timeout
pub const UPSTREAM_TIMEOUT_MS: u64 = 30_000;

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "transfer-encoding",
    "upgrade",
];

/// Check whether a header is connection-specific
#[must_use]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}
