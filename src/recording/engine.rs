//! Activity recorder: session lifecycle, request recording and correlation

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::RecorderConfig;
use crate::har::{
    Cache, Content, Entry, Har, Initiator, InitiatorType, NameValue, Page, PageTimings, PostData,
    Request, ResourceType, Response, Timings, BODY_MIME_TYPE, UNKNOWN_SIZE,
};
use crate::url::normalize_url;
use crate::{HartraceError, Result};

use super::export::HarExport;
use super::session::SessionLog;
use super::{RequestDescriptor, RequestToken, ResponseDescriptor};
use super::{PAGE_LOAD_MIME_TYPE, PAGE_LOAD_TEXT};

/// Which signal completed an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Response,
    Error,
}

impl Signal {
    fn as_str(self) -> &'static str {
        match self {
            Signal::Response => "response",
            Signal::Error => "error",
        }
    }
}

/// Records one browsing session and exports it as a HAR document
///
/// Every operation runs to completion synchronously. Failures are returned
/// as errors and never leave an entry partially written, so callers on the
/// request path can discard them.
#[derive(Debug, Clone)]
pub struct ActivityRecorder {
    config: RecorderConfig,
    session: SessionLog,
    sequence: u64,
}

impl ActivityRecorder {
    /// Create a recorder with a page for the origin and no entries
    ///
    /// Traffic seen before the first navigation is recorded against this
    /// page.
    #[must_use]
    pub fn new(config: RecorderConfig) -> Self {
        let page = Page {
            started_date_time: Utc::now(),
            id: config.page_id.clone(),
            title: config.origin.clone(),
            page_timings: PageTimings::default(),
        };
        let session = SessionLog::new(config.creator.clone(), page);

        Self {
            config,
            session,
            sequence: 0,
        }
    }

    /// The current session log
    #[must_use]
    pub fn session(&self) -> &SessionLog {
        &self.session
    }

    /// Origin used to resolve relative URLs
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.config.origin
    }

    /// Normalize a URL against the recorder origin
    #[must_use]
    pub fn normalize(&self, url: &str) -> String {
        normalize_url(url, &self.config.origin)
    }

    /// Start a new page, discarding every entry of the previous one
    ///
    /// The new log holds the page and a synthetic page-load entry that is
    /// already complete.
    pub fn start_new_activity(&mut self, target_url: &str) {
        let started_at = Utc::now();
        let title = self.normalize(target_url);

        let page = Page {
            started_date_time: started_at,
            id: self.config.page_id.clone(),
            title: title.clone(),
            page_timings: PageTimings::default(),
        };

        let page_load = Entry {
            initiator: Initiator {
                kind: InitiatorType::Document,
            },
            resource_type: ResourceType::Document,
            cache: Cache::default(),
            connection: String::new(),
            pageref: self.config.page_id.clone(),
            request: Request {
                method: "GET".to_string(),
                url: title.clone(),
                http_version: String::new(),
                headers: Vec::new(),
                query_string: Vec::new(),
                cookies: Vec::new(),
                headers_size: UNKNOWN_SIZE,
                body_size: UNKNOWN_SIZE,
                post_data: None,
            },
            response: Some(Response {
                status: 200,
                status_text: String::new(),
                http_version: String::new(),
                headers: Vec::new(),
                cookies: Vec::new(),
                content: Content {
                    size: 0,
                    mime_type: PAGE_LOAD_MIME_TYPE.to_string(),
                    text: Some(PAGE_LOAD_TEXT.to_string()),
                    encoding: None,
                },
                redirect_url: String::new(),
                headers_size: UNKNOWN_SIZE,
                body_size: UNKNOWN_SIZE,
            }),
            server_ip_address: None,
            started_date_time: started_at,
            time: 0.0,
            timings: Timings::unmeasured(),
        };

        let discarded = self.session.entries().len();
        self.session = SessionLog::for_page(self.config.creator.clone(), page, page_load);

        info!("Started new activity: {} ({} entries discarded)", title, discarded);
    }

    /// Record an outgoing request as a pending entry
    ///
    /// # Errors
    ///
    /// Returns error if the request body cannot be serialized; the log is
    /// left unchanged
    pub fn add_request(
        &mut self,
        request: &RequestDescriptor,
        started_at: DateTime<Utc>,
    ) -> Result<RequestToken> {
        let url = self.normalize(&request.url);

        let post_data = match request.body.as_ref().filter(|body| !body.is_empty()) {
            Some(body) => {
                let archived = body.to_archive_text()?;
                Some(PostData {
                    mime_type: BODY_MIME_TYPE.to_string(),
                    text: archived.text,
                    encoding: archived.encoding.map(str::to_string),
                })
            }
            None => None,
        };

        let entry = Entry {
            initiator: Initiator {
                kind: InitiatorType::Script,
            },
            resource_type: ResourceType::Xhr,
            cache: Cache::default(),
            connection: String::new(),
            pageref: self.config.page_id.clone(),
            request: Request {
                method: request.method.clone(),
                url: url.clone(),
                http_version: String::new(),
                headers: NameValue::list(&request.headers),
                query_string: NameValue::list(&request.query),
                cookies: Vec::new(),
                headers_size: UNKNOWN_SIZE,
                body_size: UNKNOWN_SIZE,
                post_data,
            },
            response: None,
            server_ip_address: None,
            started_date_time: started_at,
            time: 0.0,
            timings: Timings::unmeasured(),
        };

        self.sequence += 1;
        let epoch = self.session.page().started_date_time;
        let token = RequestToken::derive(epoch, self.sequence, &url);

        self.session.push_pending(token, entry);

        debug!(
            "Recorded request {} {} (token: {}, entries: {})",
            request.method,
            url,
            token,
            self.session.entries().len()
        );

        Ok(token)
    }

    /// Attach a successful response to the request recorded with the same
    /// URL and start time
    ///
    /// Returns the elapsed milliseconds written to the entry.
    ///
    /// # Errors
    ///
    /// Returns error if no pending entry matches or the body cannot be
    /// serialized; the log is left unchanged
    pub fn add_response(
        &mut self,
        response: &ResponseDescriptor,
        started_at: DateTime<Utc>,
    ) -> Result<f64> {
        self.correlate_by_key(response, started_at, Signal::Response)
    }

    /// Attach a failed-request signal to the request recorded with the same
    /// URL and start time
    ///
    /// The error is stored exactly like a response.
    ///
    /// # Errors
    ///
    /// Returns error if no pending entry matches or the body cannot be
    /// serialized; the log is left unchanged
    pub fn add_error(
        &mut self,
        error: &ResponseDescriptor,
        started_at: DateTime<Utc>,
    ) -> Result<f64> {
        self.correlate_by_key(error, started_at, Signal::Error)
    }

    /// Attach a successful response to the request named by `token`
    ///
    /// # Errors
    ///
    /// Returns error if the token names no pending entry or the body cannot
    /// be serialized; the log is left unchanged
    pub fn complete_response(
        &mut self,
        token: RequestToken,
        response: &ResponseDescriptor,
    ) -> Result<f64> {
        self.correlate_by_token(token, response, Signal::Response)
    }

    /// Attach a failed-request signal to the request named by `token`
    ///
    /// # Errors
    ///
    /// Returns error if the token names no pending entry or the body cannot
    /// be serialized; the log is left unchanged
    pub fn complete_error(
        &mut self,
        token: RequestToken,
        error: &ResponseDescriptor,
    ) -> Result<f64> {
        self.correlate_by_token(token, error, Signal::Error)
    }

    /// Snapshot of the current log in its archive envelope
    #[must_use]
    pub fn har(&self) -> Har {
        self.session.to_har()
    }

    /// Serialize the current log for download
    ///
    /// Pending entries are exported as they are.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn export(&self) -> Result<HarExport> {
        let export = HarExport::from_har(&self.har(), Utc::now())?;

        debug!(
            "Exported {} entries ({} pending) as {}",
            self.session.entries().len(),
            self.session.pending_count(),
            export.file_name()
        );

        Ok(export)
    }

    fn correlate_by_key(
        &mut self,
        response: &ResponseDescriptor,
        started_at: DateTime<Utc>,
        signal: Signal,
    ) -> Result<f64> {
        let url = self.normalize(&response.url);
        let index = self
            .session
            .find_pending(&url, started_at)
            .ok_or(HartraceError::CorrelationMiss { url, started_at })?;

        self.complete(index, response, signal)
    }

    fn correlate_by_token(
        &mut self,
        token: RequestToken,
        response: &ResponseDescriptor,
        signal: Signal,
    ) -> Result<f64> {
        let index = self
            .session
            .resolve_token(token)
            .ok_or(HartraceError::UnknownToken(token))?;

        self.complete(index, response, signal)
    }

    fn complete(
        &mut self,
        index: usize,
        response: &ResponseDescriptor,
        signal: Signal,
    ) -> Result<f64> {
        let record = build_response(response)?;
        let elapsed = elapsed_ms(self.session.started_at(index), Utc::now());

        self.session.complete(index, record, elapsed, response.server_ip.clone());

        debug!(
            "Correlated {} {} for {} in {:.1}ms",
            signal.as_str(),
            response.status,
            self.session.entries()[index].request.url,
            elapsed
        );

        Ok(elapsed)
    }
}

/// Build the archive response record from a descriptor
fn build_response(response: &ResponseDescriptor) -> Result<Response> {
    let (size, text, encoding) = match response.body.as_ref().filter(|body| !body.is_empty()) {
        Some(body) => {
            let archived = body.to_archive_text()?;
            (
                body.size()?,
                Some(archived.text),
                archived.encoding.map(str::to_string),
            )
        }
        None => (0, None, None),
    };

    Ok(Response {
        status: response.status,
        status_text: response.status_text.clone(),
        http_version: String::new(),
        headers: NameValue::list(&response.headers),
        cookies: Vec::new(),
        content: Content {
            size,
            mime_type: BODY_MIME_TYPE.to_string(),
            text,
            encoding,
        },
        redirect_url: String::new(),
        headers_size: UNKNOWN_SIZE,
        body_size: UNKNOWN_SIZE,
    })
}

/// Milliseconds from `started_at` to `now`, never negative
fn elapsed_ms(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let delta = now.signed_duration_since(started_at);
    let ms = delta
        .num_microseconds()
        .map_or(delta.num_milliseconds() as f64, |us| us as f64 / 1000.0);
    ms.max(0.0)
}
