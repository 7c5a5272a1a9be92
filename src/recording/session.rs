//! Session log: the active page and its entries

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::har::{Creator, Entry, Har, Log, Page, Response};

use super::RequestToken;

/// In-memory log of one browsing session
///
/// Holds exactly one page. Entries are kept in the order their requests
/// were recorded; pending entries are indexed by their request token.
#[derive(Debug, Clone)]
pub struct SessionLog {
    log: Log,
    pending: HashMap<RequestToken, usize>,
}

impl SessionLog {
    /// Create a log for `page` with no entries
    #[must_use]
    pub fn new(creator: Creator, page: Page) -> Self {
        let mut log = Log::new(creator);
        log.pages.push(page);

        Self {
            log,
            pending: HashMap::new(),
        }
    }

    /// Create a log for a freshly started page
    #[must_use]
    pub fn for_page(creator: Creator, page: Page, page_load: Entry) -> Self {
        let mut session = Self::new(creator, page);
        session.log.entries.push(page_load);
        session
    }

    /// The underlying archive log
    #[must_use]
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// The active page
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.log.pages[0]
    }

    /// Recorded entries in recording order
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.log.entries
    }

    /// Number of entries still waiting for a response
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.log.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Wrap a copy of the log in an archive envelope
    #[must_use]
    pub fn to_har(&self) -> Har {
        Har {
            log: self.log.clone(),
        }
    }

    /// Append a pending entry under its token
    pub(crate) fn push_pending(&mut self, token: RequestToken, entry: Entry) {
        debug_assert!(entry.is_pending(), "pushed entry must be pending");

        self.pending.insert(token, self.log.entries.len());
        self.log.entries.push(entry);
    }

    /// Find the first pending entry matching a correlation key
    pub(crate) fn find_pending(&self, url: &str, started_at: DateTime<Utc>) -> Option<usize> {
        self.log
            .entries
            .iter()
            .position(|e| {
                e.is_pending() && e.request.url == url && e.started_date_time == started_at
            })
    }

    /// Resolve a token to the index of its pending entry
    pub(crate) fn resolve_token(&self, token: RequestToken) -> Option<usize> {
        self.pending
            .get(&token)
            .copied()
            .filter(|&index| self.log.entries[index].is_pending())
    }

    /// Start time of the entry at `index`
    pub(crate) fn started_at(&self, index: usize) -> DateTime<Utc> {
        self.log.entries[index].started_date_time
    }

    /// Attach a response to a pending entry and record its elapsed time
    pub(crate) fn complete(
        &mut self,
        index: usize,
        response: Response,
        elapsed_ms: f64,
        server_ip: Option<String>,
    ) {
        let entry = &mut self.log.entries[index];
        debug_assert!(entry.is_pending(), "entry completed twice");

        entry.response = Some(response);
        entry.server_ip_address = server_ip;
        entry.time = elapsed_ms;
        entry.timings.wait = elapsed_ms;

        self.pending.retain(|_, pending_index| *pending_index != index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{
        Cache, Content, Initiator, InitiatorType, PageTimings, Request, ResourceType, Timings,
    };

    fn creator() -> Creator {
        Creator {
            name: "test".to_string(),
            version: "1".to_string(),
        }
    }

    fn pending_entry(url: &str, started_at: DateTime<Utc>) -> Entry {
        Entry {
            initiator: Initiator {
                kind: InitiatorType::Script,
            },
            resource_type: ResourceType::Xhr,
            cache: Cache::default(),
            connection: String::new(),
            pageref: "page_1".to_string(),
            request: Request {
                method: "GET".to_string(),
                url: url.to_string(),
                http_version: String::new(),
                headers: vec![],
                query_string: vec![],
                cookies: vec![],
                headers_size: -1,
                body_size: -1,
                post_data: None,
            },
            response: None,
            server_ip_address: None,
            started_date_time: started_at,
            time: 0.0,
            timings: Timings::unmeasured(),
        }
    }

    fn ok_response() -> Response {
        Response {
            status: 200,
            status_text: String::new(),
            http_version: String::new(),
            headers: vec![],
            cookies: vec![],
            content: Content {
                size: 0,
                mime_type: "application/json".to_string(),
                text: None,
                encoding: None,
            },
            redirect_url: String::new(),
            headers_size: -1,
            body_size: -1,
        }
    }

    fn page(started_at: DateTime<Utc>) -> Page {
        Page {
            started_date_time: started_at,
            id: "page_1".to_string(),
            title: "http://localhost/home".to_string(),
            page_timings: PageTimings::default(),
        }
    }

    fn token(n: u64) -> RequestToken {
        RequestToken::derive(DateTime::from_timestamp(0, 0).unwrap(), n, "x")
    }

    #[test]
    fn test_new_log_has_one_page() {
        let session = SessionLog::new(creator(), page(Utc::now()));
        assert_eq!(session.log().pages.len(), 1);
        assert!(session.entries().is_empty());
        assert_eq!(session.log().version, "1.2");
    }

    #[test]
    fn test_for_page() {
        let now = Utc::now();
        let session =
            SessionLog::for_page(creator(), page(now), pending_entry("http://localhost/home", now));

        assert_eq!(session.page().id, "page_1");
        assert_eq!(session.entries().len(), 1);
    }

    #[test]
    fn test_find_pending_first_match_wins() {
        let now = Utc::now();
        let mut session = SessionLog::new(creator(), page(now));
        session.push_pending(token(1), pending_entry("http://a/x", now));
        session.push_pending(token(2), pending_entry("http://a/x", now));

        assert_eq!(session.find_pending("http://a/x", now), Some(0));

        session.complete(0, ok_response(), 5.0, None);
        assert_eq!(session.find_pending("http://a/x", now), Some(1));
        assert_eq!(session.resolve_token(token(1)), None);
        assert_eq!(session.resolve_token(token(2)), Some(1));
    }

    #[test]
    fn test_complete_sets_time_and_wait() {
        let now = Utc::now();
        let mut session = SessionLog::new(creator(), page(now));
        session.push_pending(token(1), pending_entry("http://a/x", now));

        session.complete(0, ok_response(), 12.5, Some("10.0.0.7".to_string()));

        let entry = &session.entries()[0];
        assert!(!entry.is_pending());
        assert_eq!(entry.server_ip_address.as_deref(), Some("10.0.0.7"));
        assert!((entry.time - 12.5).abs() < f64::EPSILON);
        assert!((entry.timings.wait - 12.5).abs() < f64::EPSILON);
        assert!((entry.timings.dns - -1.0).abs() < f64::EPSILON);
        assert_eq!(session.pending_count(), 0);
    }
}
