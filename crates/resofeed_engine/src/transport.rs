//! Transport abstraction: the injected page-fetch collaborator.

use crate::error::{FeedError, FeedResult};
use parking_lot::Mutex;
use resofeed_protocol::{PageEnvelope, Record};
use std::collections::VecDeque;

/// The page-fetch collaborator the replication driver is built on.
///
/// Implementations perform the authenticated request and JSON decoding.
/// A failed request must surface as an error, never as a successful empty
/// envelope: the driver treats an empty page as "caught up", and must not
/// conflate that with "request failed".
pub trait PageTransport: Send + Sync {
    /// Fetches one page of `resource` using the given ordered query options.
    fn fetch_page(&self, resource: &str, options: &[(String, String)])
        -> FeedResult<PageEnvelope>;
}

/// Raw single-value fetch, for by-key and metadata reads outside the
/// paginated surface.
pub trait RawFetch: Send + Sync {
    /// Fetches the JSON value at `path_and_query`, relative to the feed root.
    fn fetch_value(&self, path_and_query: &str) -> FeedResult<serde_json::Value>;
}

enum ScriptedResponse {
    Page(PageEnvelope),
    Error(FeedError),
}

/// A scripted transport for testing.
///
/// Serves queued responses in order and records every request it receives.
/// Once the queue is exhausted it serves empty pages, matching a feed that
/// has been fully caught up with.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    values: Mutex<VecDeque<serde_json::Value>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockTransport {
    /// Creates a mock transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a page of records.
    pub fn push_page(&self, records: Vec<Record>) {
        self.responses
            .lock()
            .push_back(ScriptedResponse::Page(PageEnvelope::from_records(records)));
    }

    /// Queues a full envelope (for `@odata.count` responses and the like).
    pub fn push_envelope(&self, envelope: PageEnvelope) {
        self.responses
            .lock()
            .push_back(ScriptedResponse::Page(envelope));
    }

    /// Queues an error response.
    pub fn push_error(&self, error: FeedError) {
        self.responses
            .lock()
            .push_back(ScriptedResponse::Error(error));
    }

    /// Queues a raw value for [`RawFetch`].
    pub fn push_value(&self, value: serde_json::Value) {
        self.values.lock().push_back(value);
    }

    /// All requests received so far, as `(resource, options)` pairs.
    ///
    /// Raw fetches are recorded with the path as the resource and no options.
    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().clone()
    }
}

impl PageTransport for MockTransport {
    fn fetch_page(
        &self,
        resource: &str,
        options: &[(String, String)],
    ) -> FeedResult<PageEnvelope> {
        self.calls
            .lock()
            .push((resource.to_string(), options.to_vec()));

        match self.responses.lock().pop_front() {
            Some(ScriptedResponse::Page(envelope)) => Ok(envelope),
            Some(ScriptedResponse::Error(error)) => Err(error),
            None => Ok(PageEnvelope::default()),
        }
    }
}

impl RawFetch for MockTransport {
    fn fetch_value(&self, path_and_query: &str) -> FeedResult<serde_json::Value> {
        self.calls
            .lock()
            .push((path_and_query.to_string(), Vec::new()));

        self.values
            .lock()
            .pop_front()
            .ok_or_else(|| FeedError::transport_fatal("no scripted value response"))
    }
}
