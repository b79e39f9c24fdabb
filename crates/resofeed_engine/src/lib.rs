//! # resofeed engine
//!
//! Checkpointed replication driver and feed client for paginated
//! OData-style real-estate feeds.
//!
//! This crate provides:
//! - `Replicator`: the page-by-page replication loop over a checkpoint
//! - Three access patterns: single-page fetch, per-page callback, and
//!   whole-collection buffering
//! - `PageTransport` / `HttpClient` abstractions (bring your own HTTP
//!   library)
//! - `FeedApi`: per-resource convenience wrappers (Property, Media, Lookup,
//!   Field)
//!
//! ## Architecture
//!
//! The driver issues one page request at a time: each page's last record
//! determines the next page's boundary filter, so there is no pipelining.
//! Collaborator failures propagate immediately and leave the checkpoint at
//! its last successfully-advanced value, which is exactly the resumption
//! point — at-least-once page delivery.
//!
//! ## Key invariants
//!
//! - The checkpoint advances exactly once per non-empty page, from that
//!   page's last record.
//! - An empty page is the sole terminal success signal; a short page ends
//!   the run without the extra round trip.
//! - A caller filter narrows the boundary filter, never widens it.
//! - The engine never retries; retry policy belongs to the transport or the
//!   caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod error;
mod http;
mod replicate;
mod transport;

pub use api::{FeedApi, FilterOptions, Resource};
pub use config::ClientConfig;
pub use error::{FeedError, FeedResult};
pub use http::{HttpClient, HttpResponse, HttpTransport};
pub use replicate::{PullOptions, ReplicationSummary, Replicator};
pub use transport::{MockTransport, PageTransport, RawFetch};
