//! Request and response descriptors handed to the recorder

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::de::IgnoredAny;

use crate::har::BASE64_ENCODING;
use crate::Result;

/// Body text as written into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveText {
    /// Stored text
    pub text: String,
    /// Encoding of `text`, `None` when it is the body itself
    pub encoding: Option<&'static str>,
}

impl ArchiveText {
    fn plain(text: String) -> Self {
        Self {
            text,
            encoding: None,
        }
    }
}

/// Body carried by a request, response or error
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured JSON value
    Json(serde_json::Value),
    /// Plain text
    Text(String),
    /// Raw bytes as received on the wire
    Binary(Bytes),
}

impl Payload {
    /// Check whether the payload has no content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Json(value) => value.is_null(),
            Payload::Text(text) => text.is_empty(),
            Payload::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Serialize the payload to the text stored in the archive
    ///
    /// JSON values and bytes that already hold JSON keep their JSON text;
    /// other text is written as a JSON string literal. Bytes that are not
    /// UTF-8 (compressed or binary bodies) are stored base64-encoded.
    ///
    /// # Errors
    ///
    /// Returns error if a JSON value cannot be serialized
    pub fn to_archive_text(&self) -> Result<ArchiveText> {
        match self {
            Payload::Json(value) => Ok(ArchiveText::plain(serde_json::to_string(value)?)),
            Payload::Text(text) => Ok(ArchiveText::plain(serde_json::to_string(text)?)),
            Payload::Binary(bytes) => {
                let Ok(text) = std::str::from_utf8(bytes) else {
                    return Ok(ArchiveText {
                        text: STANDARD.encode(bytes),
                        encoding: Some(BASE64_ENCODING),
                    });
                };

                if serde_json::from_str::<IgnoredAny>(text).is_ok() {
                    Ok(ArchiveText::plain(text.to_string()))
                } else {
                    Ok(ArchiveText::plain(serde_json::to_string(text)?))
                }
            }
        }
    }

    /// Length of the payload in bytes as received
    ///
    /// # Errors
    ///
    /// Returns error if a JSON value cannot be serialized
    pub fn size(&self) -> Result<u64> {
        let len = match self {
            Payload::Json(value) => serde_json::to_vec(value)?.len(),
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        };
        Ok(len as u64)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

/// Outgoing request as seen by the interception layer
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: String,
    /// URL as issued, absolute or relative
    pub url: String,
    /// Headers in the order received
    pub headers: Vec<(String, String)>,
    /// Query parameters in the order received
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Option<Payload>,
}

impl RequestDescriptor {
    /// Create a request without headers, parameters or body
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Completed exchange: a successful response or a failed-request signal
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    /// URL of the request that produced this response
    pub url: String,
    /// Status code, 0 when no response was received
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Headers in the order received
    pub headers: Vec<(String, String)>,
    /// Response body or error payload
    pub body: Option<Payload>,
    /// Address of the server that answered, when known
    pub server_ip: Option<String>,
}

impl ResponseDescriptor {
    /// Create a response with the given status and no headers or body
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: None,
            server_ip: None,
        }
    }

    /// Set the status text
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the address of the answering server
    #[must_use]
    pub fn with_server_ip(mut self, server_ip: impl Into<String>) -> Self {
        self.server_ip = Some(server_ip.into());
        self
    }

    /// Check whether the status denotes success
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
