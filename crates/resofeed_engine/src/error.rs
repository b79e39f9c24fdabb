//! Error types for the replication engine.

use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can occur while talking to the feed.
///
/// The engine never retries on its own; the `retryable` classification is
/// for callers (or the transport) to build a retry policy on. Whenever an
/// error escapes the replication loop, the checkpoint is left at its last
/// successfully-advanced value, which is exactly the resumption point.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Network or connection-level failure reported by the HTTP client.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// Non-success HTTP response from the resource server.
    #[error("http error: status {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response payload could not be decoded as the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A page's last record lacks an ordering-key field, so the checkpoint
    /// cannot be advanced past that page.
    #[error("record in {resource} is missing ordering field {field}")]
    MissingOrderingField {
        /// Resource being replicated.
        resource: String,
        /// The absent field.
        field: String,
    },

    /// A per-page consumer declined to continue the sync.
    #[error("sync aborted by consumer: {0}")]
    Aborted(String),
}

impl FeedError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a consumer-abort error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }

    /// Returns true if retrying the failed request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Transport { retryable, .. } => *retryable,
            FeedError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
