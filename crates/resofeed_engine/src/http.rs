//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different libraries
//! (reqwest, ureq, hyper) can be plugged in without this crate depending on
//! any of them. This module owns the plumbing around the client: URL and
//! query-string assembly, bearer authentication headers, and decoding of the
//! JSON envelope.

use crate::config::ClientConfig;
use crate::error::{FeedError, FeedResult};
use crate::transport::{PageTransport, RawFetch};
use resofeed_protocol::PageEnvelope;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Request
/// timeouts and low-level retry belong to the implementation, not to the
/// replication engine.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with the given headers.
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, String>;
}

/// A plain HTTP response: status code and raw body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Bearer-authenticated JSON transport over an abstract [`HttpClient`].
pub struct HttpTransport<C: HttpClient> {
    config: ClientConfig,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: ClientConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Joins the base URL and a resource path.
    fn build_url(&self, path_and_query: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path_and_query.trim_start_matches('/')
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.config.access_token),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    /// Fetches a path relative to the feed root and decodes the JSON body.
    fn get_json(&self, path_and_query: &str) -> FeedResult<serde_json::Value> {
        let url = self.build_url(path_and_query);
        tracing::debug!(%url, "feed request");

        let response = self
            .client
            .get(&url, &self.headers())
            .map_err(FeedError::transport_retryable)?;

        if response.status != 200 {
            return Err(FeedError::Http {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

/// Renders ordered query options as `key=value&...`.
///
/// Values are passed through verbatim; any encoding has already been applied
/// when the filter was built.
fn query_string(options: &[(String, String)]) -> String {
    options
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

impl<C: HttpClient> PageTransport for HttpTransport<C> {
    fn fetch_page(
        &self,
        resource: &str,
        options: &[(String, String)],
    ) -> FeedResult<PageEnvelope> {
        let path = if options.is_empty() {
            resource.to_string()
        } else {
            format!("{resource}?{}", query_string(options))
        };

        let value = self.get_json(&path)?;
        serde_json::from_value(value).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

impl<C: HttpClient> RawFetch for HttpTransport<C> {
    fn fetch_value(&self, path_and_query: &str) -> FeedResult<serde_json::Value> {
        self.get_json(path_and_query)
    }
}
