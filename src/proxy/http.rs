//! HTTP proxy that feeds intercepted traffic into the recorder

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::recording::{
    ActivityRecorder, HarExport, Payload, RequestDescriptor, RequestToken, ResponseDescriptor,
};
use crate::Result;

use super::{ResponderSet, TrafficFilter, Upstream};

/// Status text recorded when no response was received
const TRANSPORT_FAILURE_TEXT: &str = "Unknown Error";

/// Intercepts requests, answers or forwards them, and records the exchange
///
/// Recorder failures never affect the request flow: they are logged at
/// debug level and dropped.
pub struct HttpProxy<U> {
    recorder: Arc<Mutex<ActivityRecorder>>,
    upstream: U,
    filter: TrafficFilter,
    responders: ResponderSet,
}

impl<U: Upstream> HttpProxy<U> {
    /// Create a proxy with a fresh recorder
    #[must_use]
    pub fn new(config: &Config, upstream: U) -> Self {
        let recorder = Arc::new(Mutex::new(ActivityRecorder::new(config.recorder.clone())));
        Self::with_recorder(config, recorder, upstream)
    }

    /// Create a proxy that records into an existing recorder
    #[must_use]
    pub fn with_recorder(
        config: &Config,
        recorder: Arc<Mutex<ActivityRecorder>>,
        upstream: U,
    ) -> Self {
        Self {
            recorder,
            upstream,
            filter: TrafficFilter::new(&config.filter),
            responders: ResponderSet::from_config(&config.responders, &config.recorder.origin),
        }
    }

    /// Replace the local responders
    #[must_use]
    pub fn with_responders(mut self, responders: ResponderSet) -> Self {
        self.responders = responders;
        self
    }

    /// Shared recorder
    #[must_use]
    pub fn recorder(&self) -> &Arc<Mutex<ActivityRecorder>> {
        &self.recorder
    }

    /// Navigation signal: start a new page
    pub async fn navigate(&self, target_url: &str) {
        self.recorder.lock().await.start_new_activity(target_url);
    }

    /// Export the current session
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub async fn export(&self) -> Result<HarExport> {
        self.recorder.lock().await.export()
    }

    /// Handle an intercepted request
    ///
    /// Local responders answer first; everything else goes upstream. The
    /// exchange is recorded unless the request is excluded.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream request fails
    pub async fn handle_request(&self, request: RequestDescriptor) -> Result<ResponseDescriptor> {
        let started_at = Utc::now();

        let token = if self.filter.is_excluded(&request.url) {
            debug!("Excluded from recording: {} {}", request.method, request.url);
            None
        } else {
            let result = self.recorder.lock().await.add_request(&request, started_at);
            match result {
                Ok(token) => Some(token),
                Err(e) => {
                    debug!("Request not recorded: {} {}: {}", request.method, request.url, e);
                    None
                }
            }
        };

        if let Some(response) = self.responders.respond(&request) {
            info!("Answered locally: {} {}", request.method, request.url);
            self.record_outcome(token, &response).await;
            return Ok(response);
        }

        match self.upstream.send(&request).await {
            Ok(response) => {
                debug!(
                    "Upstream answered {} {} -> {}",
                    request.method, request.url, response.status
                );
                self.record_outcome(token, &response).await;
                Ok(response)
            }
            Err(e) => {
                warn!("Upstream failed for {} {}: {}", request.method, request.url, e);
                let failure = ResponseDescriptor::new(request.url.clone(), 0)
                    .with_status_text(TRANSPORT_FAILURE_TEXT)
                    .with_body(Payload::Text(e.to_string()));
                self.record_outcome(token, &failure).await;
                Err(e)
            }
        }
    }

    /// Hand a response or error to the recorder
    async fn record_outcome(&self, token: Option<RequestToken>, response: &ResponseDescriptor) {
        let Some(token) = token else {
            return;
        };

        let mut recorder = self.recorder.lock().await;
        let result = if response.is_success() {
            recorder.complete_response(token, response)
        } else if self.filter.records_error(response.status) {
            recorder.complete_error(token, response)
        } else {
            debug!("Error status {} not recorded ({})", response.status, token);
            return;
        };
        drop(recorder);

        if let Err(e) = result {
            debug!("Response not recorded for {}: {}", response.url, e);
        }
    }
}
