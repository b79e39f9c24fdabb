//! Configuration for the feed client.

use std::time::Duration;

/// Configuration for a feed client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the OData feed, e.g. `https://query.example.test/odata`.
    pub base_url: String,
    /// Bearer token for the `Authorization` header.
    pub access_token: String,
    /// Default page size for replication requests.
    pub batch_size: u32,
    /// Default delay between successive page fetches. Politeness only;
    /// zero is fine for tests and trusted backends.
    pub pacing: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given feed.
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            batch_size: 100,
            pacing: Duration::ZERO,
        }
    }

    /// Sets the default page size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the inter-page pacing delay.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}
