//! Local responders that answer requests without forwarding them

use crate::config::ResponderConfig;
use crate::recording::{Payload, RequestDescriptor, ResponseDescriptor};
use crate::url::normalize_url;

/// Capability to answer a request locally
///
/// Implementations return `None` for requests they do not handle.
pub trait LocalResponder: Send + Sync {
    /// Produce a response for `request`, if this responder owns it
    fn respond(&self, request: &RequestDescriptor) -> Option<ResponseDescriptor>;
}

/// Fixed JSON response for one URL
#[derive(Debug, Clone)]
pub struct CannedResponder {
    url: String,
    origin: String,
    status: u16,
    status_text: String,
    body: serde_json::Value,
}

impl CannedResponder {
    /// Create a responder for `url`, resolved against `origin`
    #[must_use]
    pub fn new(url: &str, origin: &str, status: u16, body: serde_json::Value) -> Self {
        Self {
            url: normalize_url(url, origin),
            origin: origin.to_string(),
            status,
            status_text: String::new(),
            body,
        }
    }

    /// Create a responder from its configuration
    #[must_use]
    pub fn from_config(config: &ResponderConfig, origin: &str) -> Self {
        let mut responder = Self::new(&config.url, origin, config.status, config.body.clone());
        responder.status_text.clone_from(&config.status_text);
        responder
    }

    /// Absolute URL this responder answers
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl LocalResponder for CannedResponder {
    fn respond(&self, request: &RequestDescriptor) -> Option<ResponseDescriptor> {
        let url = normalize_url(&request.url, &self.origin);
        if url != self.url {
            return None;
        }

        let mut response = ResponseDescriptor::new(self.url.clone(), self.status)
            .with_status_text(self.status_text.clone())
            .with_header("content-type", "application/json");
        if !self.body.is_null() {
            response = response.with_body(Payload::Json(self.body.clone()));
        }
        Some(response)
    }
}

/// Ordered set of local responders; the first match answers
#[derive(Default)]
pub struct ResponderSet {
    responders: Vec<Box<dyn LocalResponder>>,
}

impl ResponderSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from configured canned responses
    #[must_use]
    pub fn from_config(configs: &[ResponderConfig], origin: &str) -> Self {
        let mut set = Self::new();
        for config in configs {
            set.push(CannedResponder::from_config(config, origin));
        }
        set
    }

    /// Add a responder after the existing ones
    pub fn push(&mut self, responder: impl LocalResponder + 'static) {
        self.responders.push(Box::new(responder));
    }

    /// Number of responders
    #[must_use]
    pub fn len(&self) -> usize {
        self.responders.len()
    }

    /// Check whether the set has no responders
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }

    /// Ask each responder in turn
    #[must_use]
    pub fn respond(&self, request: &RequestDescriptor) -> Option<ResponseDescriptor> {
        self.responders.iter().find_map(|r| r.respond(request))
    }
}
