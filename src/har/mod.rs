//! HTTP Archive (HAR) document types

mod model;

pub use model::{
    Cache, Content, Cookie, Creator, Entry, Har, Initiator, InitiatorType, Log, NameValue, Page,
    PageTimings, PostData, Request, Response, ResourceType, Timings,
};

/// HAR format version written by the recorder
pub const HAR_VERSION: &str = "1.2";

/// Sentinel for timing phases that are not measured
pub const UNMEASURED: f64 = -1.0;

/// Sentinel for header and body sizes that are not measured
pub const UNKNOWN_SIZE: i64 = -1;

/// MIME type recorded for request and response bodies
pub const BODY_MIME_TYPE: &str = "application/json";

/// Content encoding for bodies that are not valid UTF-8
pub const BASE64_ENCODING: &str = "base64";

/// File extension for exported archives
pub const FILE_EXTENSION: &str = "har";
