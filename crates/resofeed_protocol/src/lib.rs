//! # resofeed protocol
//!
//! Checkpoint, query-builder, and page types for resofeed.
//!
//! This crate provides:
//! - `Checkpoint` / `RecordKey` for the resumable `(timestamp, key)` cursor
//! - `OrderingKey` and the boundary-filter query builder
//! - `PageRequest` descriptors and their ordered query options
//! - `PageEnvelope` / `Record` / `ReplicationBatch` page types
//!
//! This is a pure data crate with no I/O operations. The replication loop
//! itself lives in `resofeed_engine`.
//!
//! ## Key invariants
//!
//! - The boundary filter selects exactly the records strictly after the
//!   checkpoint under `(timestamp, key)` ordering; timestamp ties fall back
//!   to key order.
//! - A caller filter only ever narrows the boundary filter (conjunction).
//! - Sort order is always ascending `timestamp,key`; checkpoint advance in
//!   the engine is correct only under this order.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod page;
mod query;

pub use checkpoint::{Checkpoint, RecordKey, EPOCH_START};
pub use page::{ordering_pair, PageEnvelope, Record, ReplicationBatch};
pub use query::{boundary_filter, combined_filter, encode_component, OrderingKey, PageRequest};
