//! Resource-level convenience surface over the generic replication
//! capability.
//!
//! One `Replicator` does all the paging; this module only knows which
//! resources exist, which key field each one tie-breaks on, and the handful
//! of ad-hoc queries (by-key, metadata, counts) a feed consumer needs around
//! replication.

use crate::config::ClientConfig;
use crate::error::{FeedError, FeedResult};
use crate::http::{HttpClient, HttpTransport};
use crate::replicate::{PullOptions, ReplicationSummary, Replicator};
use crate::transport::{PageTransport, RawFetch};
use resofeed_protocol::{Checkpoint, OrderingKey, PageEnvelope, Record, RecordKey, ReplicationBatch};
use std::time::Duration;

/// The resource kinds exposed by the feed.
///
/// All resources order by `ModificationTimestamp` with a per-resource key
/// field as the tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Property listings.
    Property,
    /// Media records (photos, tours) attached to other resources.
    Media,
    /// Enumeration lookup values.
    Lookup,
    /// Field metadata.
    Field,
}

impl Resource {
    /// The remote resource name.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Property => "Property",
            Resource::Media => "Media",
            Resource::Lookup => "Lookup",
            Resource::Field => "Field",
        }
    }

    /// The tie-breaking key field for this resource.
    pub fn key_field(&self) -> &'static str {
        match self {
            Resource::Property => "ListingKey",
            Resource::Media => "MediaKey",
            Resource::Lookup => "LookupKey",
            Resource::Field => "FieldKey",
        }
    }

    /// The compound ordering key for this resource.
    pub fn ordering(&self) -> OrderingKey {
        OrderingKey::new("ModificationTimestamp", self.key_field())
    }
}

/// Ad-hoc query options, mirroring the raw OData knobs.
///
/// Unset fields are omitted from the request.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// `$filter` expression.
    pub filter: Option<String>,
    /// `$select` field list, caller order.
    pub select: Vec<String>,
    /// `$orderby` clause.
    pub orderby: Option<String>,
    /// `$top` page size.
    pub top: Option<u32>,
    /// `$skip` offset.
    pub skip: Option<u64>,
    /// Request `$count=true`.
    pub count: bool,
}

impl FilterOptions {
    /// Sets the `$filter` expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the `$select` field list.
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    /// Sets the `$orderby` clause.
    pub fn with_orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    /// Sets the `$top` page size.
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Sets the `$skip` offset.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Requests the total collection count.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    fn query_options(&self) -> Vec<(String, String)> {
        let mut options = Vec::new();
        if let Some(filter) = &self.filter {
            options.push(("$filter".to_string(), filter.clone()));
        }
        if !self.select.is_empty() {
            options.push(("$select".to_string(), self.select.join(",")));
        }
        if let Some(orderby) = &self.orderby {
            options.push(("$orderby".to_string(), orderby.clone()));
        }
        if let Some(top) = self.top {
            options.push(("$top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            options.push(("$skip".to_string(), skip.to_string()));
        }
        if self.count {
            options.push(("$count".to_string(), "true".to_string()));
        }
        options
    }
}

/// High-level feed client: the per-resource surface over one [`Replicator`].
pub struct FeedApi<T: PageTransport> {
    replicator: Replicator<T>,
    batch_size: u32,
    pacing: Duration,
}

impl<T: PageTransport> FeedApi<T> {
    /// Creates a feed API over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            replicator: Replicator::new(transport),
            batch_size: 100,
            pacing: Duration::ZERO,
        }
    }

    /// Sets the default replication page size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the default inter-page pacing delay.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// The underlying replicator, for callers that want to drive the
    /// generic loop with their own [`PullOptions`].
    pub fn replicator(&self) -> &Replicator<T> {
        &self.replicator
    }

    /// Default [`PullOptions`] for a resource, with this API's page size and
    /// pacing applied.
    pub fn pull_options(&self, resource: Resource, filter: Option<&str>) -> PullOptions {
        let mut options = PullOptions::new(resource.name(), resource.ordering())
            .with_batch_size(self.batch_size)
            .with_pacing(self.pacing);
        if let Some(filter) = filter {
            options = options.with_filter(filter);
        }
        options
    }

    /// Fetches the single page of `resource` immediately after `checkpoint`.
    pub fn fetch_batch(
        &self,
        resource: Resource,
        filter: Option<&str>,
        checkpoint: &Checkpoint,
    ) -> FeedResult<Vec<Record>> {
        self.replicator
            .fetch_batch(&self.pull_options(resource, filter), checkpoint)
    }

    /// Replicates `resource` page by page, handing each batch to `consumer`.
    pub fn each_batch<F>(
        &self,
        resource: Resource,
        filter: Option<&str>,
        checkpoint: &mut Checkpoint,
        consumer: F,
    ) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&ReplicationBatch) -> FeedResult<()>,
    {
        self.replicator
            .for_each_batch(&self.pull_options(resource, filter), checkpoint, consumer)
    }

    /// Replicates `resource` to completion, buffering every record.
    ///
    /// Bounded collections only: memory grows with the collection.
    pub fn download_all(
        &self,
        resource: Resource,
        filter: Option<&str>,
        checkpoint: &mut Checkpoint,
    ) -> FeedResult<Vec<Record>> {
        self.replicator
            .fetch_all(&self.pull_options(resource, filter), checkpoint)
    }

    /// Replicates property listings page by page.
    pub fn each_property_batch<F>(
        &self,
        filter: Option<&str>,
        checkpoint: &mut Checkpoint,
        consumer: F,
    ) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&ReplicationBatch) -> FeedResult<()>,
    {
        self.each_batch(Resource::Property, filter, checkpoint, consumer)
    }

    /// Downloads all property listings matching `filter`.
    pub fn download_properties(
        &self,
        filter: Option<&str>,
        checkpoint: &mut Checkpoint,
    ) -> FeedResult<Vec<Record>> {
        self.download_all(Resource::Property, filter, checkpoint)
    }

    /// Replicates media records page by page.
    pub fn each_media_batch<F>(
        &self,
        filter: Option<&str>,
        checkpoint: &mut Checkpoint,
        consumer: F,
    ) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&ReplicationBatch) -> FeedResult<()>,
    {
        self.each_batch(Resource::Media, filter, checkpoint, consumer)
    }

    /// Downloads all field metadata.
    pub fn download_fields(&self, checkpoint: &mut Checkpoint) -> FeedResult<Vec<Record>> {
        self.download_all(Resource::Field, None, checkpoint)
    }

    /// Walks the lookup collection with offset paging, yielding each page.
    ///
    /// Lookups are small and effectively static, so plain `$top`/`$skip`
    /// paging is sound here; there is no checkpoint to resume from.
    pub fn each_lookup_batch<F>(&self, consumer: F) -> FeedResult<ReplicationSummary>
    where
        F: FnMut(&[Record]) -> FeedResult<()>,
    {
        self.replicator.for_each_offset_batch(
            Resource::Lookup.name(),
            self.batch_size,
            self.pacing,
            consumer,
        )
    }

    /// Buffers the whole lookup collection.
    pub fn fetch_all_lookups(&self) -> FeedResult<Vec<Record>> {
        self.replicator
            .fetch_all_offset(Resource::Lookup.name(), self.batch_size, self.pacing)
    }

    /// Runs an ad-hoc property query with explicit OData options.
    pub fn filtered_properties(&self, options: &FilterOptions) -> FeedResult<PageEnvelope> {
        self.replicator
            .transport()
            .fetch_page(Resource::Property.name(), &options.query_options())
    }

    /// Total number of property records visible to this feed.
    pub fn property_count(&self) -> FeedResult<u64> {
        let envelope =
            self.filtered_properties(&FilterOptions::default().with_top(0).with_count())?;
        envelope
            .count
            .ok_or_else(|| FeedError::Decode("response is missing @odata.count".to_string()))
    }

    /// Fetches media created or modified since `modification_date`,
    /// narrowed by `filter`.
    pub fn recent_media(
        &self,
        filter: &str,
        modification_date: &str,
        batch_size: u32,
    ) -> FeedResult<PageEnvelope> {
        let options = vec![
            (
                "$filter".to_string(),
                format!("({filter}) and ModificationTimestamp ge {modification_date}"),
            ),
            (
                "$orderby".to_string(),
                Resource::Media.ordering().orderby_clause(),
            ),
            ("$top".to_string(), batch_size.to_string()),
        ];
        self.replicator
            .transport()
            .fetch_page(Resource::Media.name(), &options)
    }

    /// Fetches the media attached to one record of another resource.
    pub fn media_for_resource(
        &self,
        resource_name: &str,
        resource_key: &str,
        batch_size: u32,
    ) -> FeedResult<PageEnvelope> {
        let filter = format!(
            "ResourceRecordKey eq {} and ResourceName eq {}",
            RecordKey::Text(resource_key.to_string()).literal(),
            RecordKey::Text(resource_name.to_string()).literal(),
        );
        let options = vec![
            ("$filter".to_string(), filter),
            (
                "$orderby".to_string(),
                Resource::Media.ordering().orderby_clause(),
            ),
            ("$top".to_string(), batch_size.to_string()),
        ];
        self.replicator
            .transport()
            .fetch_page(Resource::Media.name(), &options)
    }
}

impl<C: HttpClient> FeedApi<HttpTransport<C>> {
    /// Builds an API over an HTTP transport, adopting the configuration's
    /// page size and pacing.
    pub fn over_http(config: ClientConfig, client: C) -> Self {
        let batch_size = config.batch_size;
        let pacing = config.pacing;
        Self::new(HttpTransport::new(config, client))
            .with_batch_size(batch_size)
            .with_pacing(pacing)
    }
}

impl<T: PageTransport + RawFetch> FeedApi<T> {
    /// Fetches the feed's `$metadata` document as JSON.
    pub fn metadata(&self) -> FeedResult<serde_json::Value> {
        self.replicator
            .transport()
            .fetch_value("$metadata?$format=json")
    }

    /// Fetches one record by its key path, e.g. `Property('X100')`.
    fn by_key(&self, resource: Resource, key: &str) -> FeedResult<serde_json::Value> {
        let escaped = key.replace('\'', "''");
        self.replicator
            .transport()
            .fetch_value(&format!("{}('{escaped}')", resource.name()))
    }

    /// Fetches the full details of a property by its listing key.
    pub fn property_by_key(&self, listing_key: &str) -> FeedResult<serde_json::Value> {
        self.by_key(Resource::Property, listing_key)
    }

    /// Fetches a media record by its media key.
    pub fn media_by_key(&self, media_key: &str) -> FeedResult<serde_json::Value> {
        self.by_key(Resource::Media, media_key)
    }
}
