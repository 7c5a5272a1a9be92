//! Interception layer between the client, the upstream and the recorder

mod filter;
mod http;
mod responder;

use std::future::Future;

pub use filter::TrafficFilter;
pub use http::HttpProxy;
pub use responder::{CannedResponder, LocalResponder, ResponderSet};

use crate::recording::{RequestDescriptor, ResponseDescriptor};
use crate::Result;

/// Destination for requests that are not answered locally
pub trait Upstream: Send + Sync {
    /// Forward a request and return the complete response
    ///
    /// Non-2xx statuses are responses, not errors. An error means no
    /// response was received.
    fn send(
        &self,
        request: &RequestDescriptor,
    ) -> impl Future<Output = Result<ResponseDescriptor>> + Send;
}
