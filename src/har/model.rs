//! HAR 1.2 document model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{HAR_VERSION, UNMEASURED};

/// Top-level archive envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    /// The recorded log
    pub log: Log,
}

/// Archive log: creator, pages and entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    /// Archive format version
    pub version: String,
    /// Producing tool
    pub creator: Creator,
    /// Navigation boundaries
    pub pages: Vec<Page>,
    /// Request/response exchanges
    pub entries: Vec<Entry>,
}

impl Log {
    /// Create an empty log for the given creator
    #[must_use]
    pub fn new(creator: Creator) -> Self {
        Self {
            version: HAR_VERSION.to_string(),
            creator,
            pages: Vec::new(),
            entries: Vec::new(),
        }
    }
}

/// Name and version of the producing tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Tool name
    pub name: String,
    /// Tool version
    pub version: String,
}

/// Start of a navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// When the navigation started
    pub started_date_time: DateTime<Utc>,
    /// Page identifier referenced by entries
    pub id: String,
    /// Normalized target URL
    pub title: String,
    /// Page load timings; never measured
    pub page_timings: PageTimings,
}

/// Page load timings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTimings {
    /// Milliseconds until the content was loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_content_load: Option<f64>,
    /// Milliseconds until the page was loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_load: Option<f64>,
}

/// Who started a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorType {
    /// Programmatic call
    Script,
    /// Page load
    Document,
}

/// Initiator extension record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiator {
    /// Initiator classification
    #[serde(rename = "type")]
    pub kind: InitiatorType,
}

/// Resource type extension tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Page document
    Document,
    /// Programmatic request
    Xhr,
}

/// One request/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Initiator classification
    #[serde(rename = "_initiator")]
    pub initiator: Initiator,
    /// Resource type tag
    #[serde(rename = "_resourceType")]
    pub resource_type: ResourceType,
    /// Cache state; never populated
    pub cache: Cache,
    /// Connection id; never populated
    pub connection: String,
    /// Owning page id
    pub pageref: String,
    /// Request sub-record
    pub request: Request,
    /// Response sub-record, `None` while pending
    #[serde(with = "pending_response")]
    pub response: Option<Response>,
    /// Address of the server that answered
    #[serde(
        rename = "serverIPAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub server_ip_address: Option<String>,
    /// When the request was issued
    pub started_date_time: DateTime<Utc>,
    /// Total elapsed milliseconds
    pub time: f64,
    /// Timing breakdown
    pub timings: Timings,
}

impl Entry {
    /// Check whether the entry is still waiting for a response
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }
}

/// Empty cache record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {}

/// Name/value pair used for headers and query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    /// Name
    pub name: String,
    /// Value
    pub value: String,
}

impl NameValue {
    /// Build a list of pairs, keeping order
    pub fn list<'a, I>(pairs: I) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        pairs
            .into_iter()
            .map(|(name, value)| Self {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Cookie record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Expiry, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie is HTTP only
    #[serde(default)]
    pub http_only: bool,
    /// Whether the cookie is secure
    #[serde(default)]
    pub secure: bool,
}

/// Request sub-record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Request method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// HTTP version; never populated
    pub http_version: String,
    /// Headers in the order received
    pub headers: Vec<NameValue>,
    /// Query parameters in the order received
    pub query_string: Vec<NameValue>,
    /// Cookies; never populated
    pub cookies: Vec<Cookie>,
    /// Header size in bytes
    pub headers_size: i64,
    /// Body size in bytes
    pub body_size: i64,
    /// Posted body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

/// Posted request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    /// Best-effort MIME type
    pub mime_type: String,
    /// Body text
    pub text: String,
    /// Encoding of `text` for bodies that are not UTF-8
    #[serde(rename = "_encoding", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Response sub-record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// HTTP version; never populated
    pub http_version: String,
    /// Headers in the order received
    pub headers: Vec<NameValue>,
    /// Cookies; never populated
    pub cookies: Vec<Cookie>,
    /// Body content
    pub content: Content,
    /// Location header target
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    /// Header size in bytes
    pub headers_size: i64,
    /// Body size in bytes
    pub body_size: i64,
}

/// Response body content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// Body length in bytes
    pub size: u64,
    /// Best-effort MIME type
    pub mime_type: String,
    /// Body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Encoding of `text`, e.g. `base64`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Timing breakdown in milliseconds; unmeasured phases hold [`UNMEASURED`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    /// Waiting for a connection
    pub blocked: f64,
    /// DNS resolution
    pub dns: f64,
    /// TLS negotiation
    pub ssl: f64,
    /// TCP connect
    pub connect: f64,
    /// Sending the request
    pub send: f64,
    /// Waiting for the response
    pub wait: f64,
    /// Reading the response
    pub receive: f64,
}

impl Timings {
    /// Every phase unmeasured
    #[must_use]
    pub fn unmeasured() -> Self {
        Self {
            blocked: UNMEASURED,
            dns: UNMEASURED,
            ssl: UNMEASURED,
            connect: UNMEASURED,
            send: UNMEASURED,
            wait: UNMEASURED,
            receive: UNMEASURED,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::unmeasured()
    }
}

/// Pending responses are written as `{}`
mod pending_response {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Response;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Complete(Response),
        Pending {},
    }

    pub fn serialize<S>(value: &Option<Response>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(response) => response.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Response>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Slot::deserialize(deserializer)? {
            Slot::Complete(response) => Some(response),
            Slot::Pending {} => None,
        })
    }
}
