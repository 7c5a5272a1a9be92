//! Opaque per-request correlation tokens

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Token length in bytes
pub const TOKEN_LEN: usize = 16;

/// Opaque handle naming one recorded request
///
/// Returned by the recorder when a request is recorded and passed back
/// with its response or error. A token never matches an entry of a later
/// page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken([u8; TOKEN_LEN]);

impl RequestToken {
    /// Derive a token from the page epoch, the recorder sequence number
    /// and the request URL
    #[must_use]
    pub(crate) fn derive(page_started: DateTime<Utc>, sequence: u64, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(page_started.timestamp().to_le_bytes());
        hasher.update(page_started.timestamp_subsec_nanos().to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update((url.len() as u32).to_le_bytes());
        hasher.update(url.as_bytes());

        let digest = hasher.finalize();
        let mut token = [0u8; TOKEN_LEN];
        token.copy_from_slice(&digest[..TOKEN_LEN]);
        Self(token)
    }

    /// Raw token bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
