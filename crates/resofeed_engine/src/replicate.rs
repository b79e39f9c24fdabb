//! The checkpointed replication loop.
//!
//! Turns an unordered, mutable remote collection into a deterministic,
//! resumable, gap-free sequence of pages. One page request is in flight at a
//! time: the next boundary filter depends on the last record of the previous
//! page, so there is no pipelining.

use crate::error::{FeedError, FeedResult};
use crate::transport::PageTransport;
use resofeed_protocol::{
    ordering_pair, Checkpoint, OrderingKey, PageEnvelope, PageRequest, Record, ReplicationBatch,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Parameters for one replication run over a single resource.
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Remote resource name.
    pub resource: String,
    /// Fields to select; defaults to the two ordering-key fields.
    pub fields: Vec<String>,
    /// Optional caller filter, conjoined with the boundary filter.
    pub filter: Option<String>,
    /// The compound ordering key for this resource.
    pub ordering: OrderingKey,
    /// Requested page size.
    pub batch_size: u32,
    /// Delay between successive page fetches. Politeness only.
    pub pacing: Duration,
}

impl PullOptions {
    /// Creates options for `resource` ordered by `ordering`.
    pub fn new(resource: impl Into<String>, ordering: OrderingKey) -> Self {
        let fields = vec![ordering.timestamp_field.clone(), ordering.key_field.clone()];
        Self {
            resource: resource.into(),
            fields,
            filter: None,
            ordering,
            batch_size: 100,
            pacing: Duration::ZERO,
        }
    }

    /// Sets the selected fields (caller order is preserved into `$select`).
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the caller filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the page size.
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

/// Outcome of a completed replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationSummary {
    /// Non-empty pages processed.
    pub pages: u64,
    /// Records emitted.
    pub records: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// The replication driver.
///
/// Drives the page-by-page walk to completion, advancing the checkpoint
/// from the last record of each non-empty page. Collaborator failures
/// propagate immediately and leave the checkpoint at its last
/// successfully-advanced value, which is exactly the resumption point.
pub struct Replicator<T: PageTransport> {
    transport: T,
}

impl<T: PageTransport> Replicator<T> {
    /// Creates a replicator over the given page-fetch collaborator.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn fetch_once(&self, options: &PullOptions, checkpoint: &Checkpoint) -> FeedResult<PageEnvelope> {
        let request = PageRequest::after_checkpoint(
            options.resource.as_str(),
            &options.fields,
            options.filter.as_deref(),
            &options.ordering,
            checkpoint,
            options.batch_size,
        );
        debug!(
            resource = %request.resource,
            top = request.top,
            filter = %request.filter,
            "fetching page"
        );
        self.transport
            .fetch_page(&request.resource, &request.query_options())
    }

    /// Fetches the single page immediately after `checkpoint`.
    ///
    /// Does not mutate the checkpoint; advancing it is the job of the
    /// iterating forms.
    pub fn fetch_batch(
        &self,
        options: &PullOptions,
        checkpoint: &Checkpoint,
    ) -> FeedResult<Vec<Record>> {
        Ok(self.fetch_once(options, checkpoint)?.records)
    }

    /// Runs the full loop, handing each non-empty page to `consumer` as a
    /// [`ReplicationBatch`] before the pacing delay.
    ///
    /// The checkpoint is owned by the calling scope for the duration of the
    /// run and is advanced exactly once per non-empty page; consumers that
    /// persist `batch.checkpoint` together with `batch.records` make the
    /// sync resumable at page granularity. A consumer error stops the run
    /// and propagates.
    pub fn for_each_batch<F>(
        &self,
        options: &PullOptions,
        checkpoint: &mut Checkpoint,
        mut consumer: F,
    ) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&ReplicationBatch) -> FeedResult<()>,
    {
        let start = Instant::now();
        let mut summary = ReplicationSummary::default();

        loop {
            let page = self.fetch_once(options, checkpoint)?;
            let count = page.records.len();
            if count == 0 {
                // Caught up: nothing after the checkpoint for this filter.
                break;
            }

            let short = count < options.batch_size as usize;
            let (timestamp, key) = self.last_pair(options, &page.records)?;
            checkpoint.advance(timestamp, key);

            summary.pages += 1;
            summary.records += count as u64;

            let batch = ReplicationBatch {
                records: page.records,
                checkpoint: checkpoint.clone(),
            };
            consumer(&batch)?;

            if short {
                // A short page is already known to be the last one.
                break;
            }
            if !options.pacing.is_zero() {
                std::thread::sleep(options.pacing);
            }
        }

        summary.elapsed = start.elapsed();
        info!(
            resource = %options.resource,
            pages = summary.pages,
            records = summary.records,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "replication run complete"
        );
        Ok(summary)
    }

    /// Runs the full loop, buffering every page into one ordered sequence.
    ///
    /// Memory grows with total record count; intended for bounded
    /// collections. Prefer [`Replicator::for_each_batch`] for large feeds.
    pub fn fetch_all(
        &self,
        options: &PullOptions,
        checkpoint: &mut Checkpoint,
    ) -> FeedResult<Vec<Record>> {
        let mut all = Vec::new();
        self.for_each_batch(options, checkpoint, |batch| {
            all.extend(batch.records.iter().cloned());
            Ok(())
        })?;
        Ok(all)
    }

    /// Walks a resource with plain `$top`/`$skip` offset paging, handing
    /// each non-empty page to `consumer`.
    ///
    /// No checkpoint and no resumability: offset paging is only sound for
    /// small, effectively static collections such as lookups. Termination
    /// follows the same rules as the checkpointed loop (empty page, or a
    /// page shorter than requested).
    pub fn for_each_offset_batch<F>(
        &self,
        resource: &str,
        batch_size: u32,
        pacing: Duration,
        mut consumer: F,
    ) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&[Record]) -> FeedResult<()>,
    {
        let start = Instant::now();
        let mut summary = ReplicationSummary::default();
        let mut skip: u64 = 0;

        loop {
            let options = vec![
                ("$top".to_string(), batch_size.to_string()),
                ("$skip".to_string(), skip.to_string()),
            ];
            debug!(resource, top = batch_size, skip, "fetching offset page");

            let page = self.transport.fetch_page(resource, &options)?;
            let count = page.records.len();
            if count == 0 {
                break;
            }

            summary.pages += 1;
            summary.records += count as u64;
            skip += count as u64;

            consumer(&page.records)?;

            if count < batch_size as usize {
                break;
            }
            if !pacing.is_zero() {
                std::thread::sleep(pacing);
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    /// Buffers a whole offset-paged collection. Bounded collections only.
    pub fn fetch_all_offset(
        &self,
        resource: &str,
        batch_size: u32,
        pacing: Duration,
    ) -> FeedResult<Vec<Record>> {
        let mut all = Vec::new();
        self.for_each_offset_batch(resource, batch_size, pacing, |records| {
            all.extend(records.iter().cloned());
            Ok(())
        })?;
        Ok(all)
    }

    fn last_pair(
        &self,
        options: &PullOptions,
        records: &[Record],
    ) -> FeedResult<(String, resofeed_protocol::RecordKey)> {
        let last = &records[records.len() - 1];
        ordering_pair(last, &options.ordering).ok_or_else(|| {
            let timestamp_ok = last
                .get(&options.ordering.timestamp_field)
                .and_then(|v| v.as_str())
                .is_some();
            let field = if timestamp_ok {
                options.ordering.key_field.clone()
            } else {
                options.ordering.timestamp_field.clone()
            };
            FeedError::MissingOrderingField {
                resource: options.resource.clone(),
                field,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use resofeed_protocol::RecordKey;
    use serde_json::json;

    fn record(timestamp: &str, key: &str) -> Record {
        let mut r = Record::new();
        r.insert("ModificationTimestamp".into(), json!(timestamp));
        r.insert("ListingKey".into(), json!(key));
        r
    }

    fn keys(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r["ListingKey"].as_str().unwrap().to_string())
            .collect()
    }

    fn options() -> PullOptions {
        PullOptions::new("Property", OrderingKey::default()).with_batch_size(2)
    }

    #[test]
    fn multi_page_run_advances_checkpoint_per_page() {
        let transport = MockTransport::new();
        transport.push_page(vec![
            record("2025-01-01T00:00:00Z", "A"),
            record("2025-01-01T00:00:00Z", "B"),
        ]);
        transport.push_page(vec![record("2025-01-02T00:00:00Z", "C")]);

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        let mut seen = Vec::new();
        let mut checkpoints = Vec::new();

        let summary = replicator
            .for_each_batch(&options(), &mut checkpoint, |batch| {
                seen.extend(keys(&batch.records));
                checkpoints.push(batch.checkpoint.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, ["A", "B", "C"]);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.records, 3);
        assert_eq!(checkpoint.last_timestamp, "2025-01-02T00:00:00Z");
        assert_eq!(checkpoint.last_key, RecordKey::Text("C".into()));

        // Per-page checkpoints are strictly increasing.
        assert!(checkpoints[0] < checkpoints[1]);
        assert_eq!(checkpoints[1], checkpoint);
    }

    #[test]
    fn short_final_page_skips_the_extra_round_trip() {
        let transport = MockTransport::new();
        transport.push_page(vec![record("2025-01-02T00:00:00Z", "C")]);

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        replicator
            .for_each_batch(&options(), &mut checkpoint, |_| Ok(()))
            .unwrap();

        assert_eq!(replicator.transport().calls().len(), 1);
    }

    #[test]
    fn empty_first_page_terminates_with_checkpoint_unchanged() {
        let transport = MockTransport::new();
        let replicator = Replicator::new(transport);

        let mut checkpoint = Checkpoint::resume("2025-01-01T00:00:00Z", "Z");
        let before = checkpoint.clone();
        let mut pages = 0;

        let summary = replicator
            .for_each_batch(&options(), &mut checkpoint, |_| {
                pages += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(pages, 0);
        assert_eq!(summary.records, 0);
        assert_eq!(checkpoint, before);
        assert_eq!(replicator.transport().calls().len(), 1);
    }

    #[test]
    fn full_page_triggers_exactly_one_more_fetch() {
        let transport = MockTransport::new();
        let full: Vec<Record> = (0..50)
            .map(|i| record("2025-01-01T00:00:00Z", &format!("K{i:03}")))
            .collect();
        transport.push_page(full);
        // Next request finds nothing: the mock serves an empty page.

        let replicator = Replicator::new(transport);
        let opts = PullOptions::new("Property", OrderingKey::default()).with_batch_size(50);
        let mut checkpoint = Checkpoint::new();

        let all = replicator.fetch_all(&opts, &mut checkpoint).unwrap();
        assert_eq!(all.len(), 50);
        assert_eq!(replicator.transport().calls().len(), 2);
        assert_eq!(checkpoint.last_key, RecordKey::Text("K049".into()));
    }

    #[test]
    fn boundary_filter_is_rebuilt_from_the_advanced_checkpoint() {
        let transport = MockTransport::new();
        transport.push_page(vec![
            record("2025-01-01T00:00:00Z", "A"),
            record("2025-01-01T00:00:00Z", "B"),
        ]);

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        replicator
            .for_each_batch(&options(), &mut checkpoint, |_| Ok(()))
            .unwrap();

        let calls = replicator.transport().calls();
        assert_eq!(calls.len(), 2);

        let filter_of = |call: &(String, Vec<(String, String)>)| {
            call.1
                .iter()
                .find(|(k, _)| k == "$filter")
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert!(filter_of(&calls[0]).contains("gt 1970-01-01T00%3A00%3A00Z"));
        assert!(filter_of(&calls[1]).contains("gt 2025-01-01T00%3A00%3A00Z"));
        assert!(filter_of(&calls[1]).contains("ListingKey gt 'B'"));
    }

    #[test]
    fn transport_error_leaves_checkpoint_at_last_good_page() {
        let transport = MockTransport::new();
        transport.push_page(vec![
            record("2025-01-01T00:00:00Z", "A"),
            record("2025-01-01T00:00:00Z", "B"),
        ]);
        transport.push_error(FeedError::Http {
            status: 500,
            body: "boom".into(),
        });

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        let err = replicator
            .for_each_batch(&options(), &mut checkpoint, |_| Ok(()))
            .unwrap_err();

        assert!(matches!(err, FeedError::Http { status: 500, .. }));
        // Resuming with this checkpoint re-requests the failed boundary.
        assert_eq!(checkpoint.last_timestamp, "2025-01-01T00:00:00Z");
        assert_eq!(checkpoint.last_key, RecordKey::Text("B".into()));
    }

    #[test]
    fn consumer_error_stops_the_run() {
        let transport = MockTransport::new();
        transport.push_page(vec![
            record("2025-01-01T00:00:00Z", "A"),
            record("2025-01-01T00:00:00Z", "B"),
        ]);
        transport.push_page(vec![record("2025-01-02T00:00:00Z", "C")]);

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        let err = replicator
            .for_each_batch(&options(), &mut checkpoint, |_| {
                Err(FeedError::aborted("stopping after first page"))
            })
            .unwrap_err();

        assert!(matches!(err, FeedError::Aborted(_)));
        assert_eq!(replicator.transport().calls().len(), 1);
        // The first page was fully received, so its checkpoint stands.
        assert_eq!(checkpoint.last_key, RecordKey::Text("B".into()));
    }

    #[test]
    fn fetch_batch_does_not_mutate_checkpoint() {
        let transport = MockTransport::new();
        transport.push_page(vec![record("2025-01-01T00:00:00Z", "A")]);

        let replicator = Replicator::new(transport);
        let checkpoint = Checkpoint::new();
        let records = replicator.fetch_batch(&options(), &checkpoint).unwrap();

        assert_eq!(keys(&records), ["A"]);
        assert_eq!(checkpoint, Checkpoint::new());
    }

    #[test]
    fn missing_ordering_field_is_an_error() {
        let transport = MockTransport::new();
        let mut r = Record::new();
        r.insert("ListingKey".into(), json!("A"));
        transport.push_page(vec![r]);

        let replicator = Replicator::new(transport);
        let mut checkpoint = Checkpoint::new();
        let err = replicator
            .for_each_batch(&options(), &mut checkpoint, |_| Ok(()))
            .unwrap_err();

        match err {
            FeedError::MissingOrderingField { resource, field } => {
                assert_eq!(resource, "Property");
                assert_eq!(field, "ModificationTimestamp");
            }
            other => panic!("expected missing-field error, got {other:?}"),
        }
        assert_eq!(checkpoint, Checkpoint::new());
    }

    #[test]
    fn offset_walk_advances_skip_and_terminates_on_empty() {
        let transport = MockTransport::new();
        transport.push_page(vec![
            record("2025-01-01T00:00:00Z", "1"),
            record("2025-01-01T00:00:00Z", "2"),
        ]);
        transport.push_page(vec![]);

        let replicator = Replicator::new(transport);
        let all = replicator
            .fetch_all_offset("Lookup", 2, Duration::ZERO)
            .unwrap();

        assert_eq!(all.len(), 2);
        let calls = replicator.transport().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].1,
            vec![
                ("$top".to_string(), "2".to_string()),
                ("$skip".to_string(), "0".to_string()),
            ]
        );
        assert_eq!(
            calls[1].1,
            vec![
                ("$top".to_string(), "2".to_string()),
                ("$skip".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn offset_walk_short_page_terminates_early() {
        let transport = MockTransport::new();
        transport.push_page(vec![record("2025-01-01T00:00:00Z", "1")]);

        let replicator = Replicator::new(transport);
        let summary = replicator
            .for_each_offset_batch("Lookup", 2, Duration::ZERO, |_| Ok(()))
            .unwrap();

        assert_eq!(summary.pages, 1);
        assert_eq!(replicator.transport().calls().len(), 1);
    }
}
