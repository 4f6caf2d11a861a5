use super::index_range::IndexRange;
use super::lazy_postings::{fetch_lazy_expanded_postings, LazyExpandedPostings};
use super::limiter::BytesLimiter;
use super::metrics::LazyPostingsMetrics;
use super::posting_group::{add_all_postings_group_if_needed, matchers_to_posting_groups};
use super::postings::BoxedPostings;
use crate::common::QueryContext;
use crate::config::LazyPostingsOptions;
use crate::error::PostingsResult;
use crate::labels::{Label, LabelMatcher};
use crate::series::SeriesRef;
use std::sync::Arc;

/// Resolves postings byte ranges and label values from a block's index header.
pub trait IndexHeaderReader: Send + Sync {
    /// Returns one range per value, in the order of `values`. Values that do not exist
    /// resolve to [`NOT_FOUND_RANGE`](super::index_range::NOT_FOUND_RANGE).
    fn postings_offsets(&self, name: &str, values: &[String]) -> PostingsResult<Vec<IndexRange>>;

    /// All values of the label `name`, sorted.
    fn label_values(&self, name: &str) -> PostingsResult<Vec<String>>;
}

/// Fetches raw postings lists for label keys.
pub trait PostingsFetcher: Send + Sync {
    /// Returns one entry per key, in the order of `keys`. `None` stands for a postings list
    /// that could not be produced and is treated as empty.
    ///
    /// Resources backing the returned postings are released when they are dropped.
    fn fetch_postings(
        &self,
        ctx: &QueryContext,
        keys: &[Label],
        limiter: &dyn BytesLimiter,
        tenant: &str,
    ) -> PostingsResult<Vec<Option<BoxedPostings>>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMeta {
    pub id: String,
    /// Estimated upper bound of the serialized size of one series in the block. 0 when unknown.
    pub estimated_max_series_size: u64,
}

impl BlockMeta {
    pub fn new(id: impl Into<String>, estimated_max_series_size: u64) -> Self {
        Self {
            id: id.into(),
            estimated_max_series_size,
        }
    }
}

/// Index reader of a single block, used for the duration of one query.
pub struct BucketIndexReader {
    block: BlockMeta,
    header: Arc<dyn IndexHeaderReader>,
    fetcher: Arc<dyn PostingsFetcher>,
    postings: Option<Vec<SeriesRef>>,
}

impl BucketIndexReader {
    pub fn new(
        block: BlockMeta,
        header: Arc<dyn IndexHeaderReader>,
        fetcher: Arc<dyn PostingsFetcher>,
    ) -> Self {
        Self {
            block,
            header,
            fetcher,
            postings: None,
        }
    }

    /// Creates a reader for an index that both resolves ranges and fetches postings.
    pub fn for_index<R>(block: BlockMeta, index: Arc<R>) -> Self
    where
        R: IndexHeaderReader + PostingsFetcher + 'static,
    {
        let header: Arc<dyn IndexHeaderReader> = index.clone();
        let fetcher: Arc<dyn PostingsFetcher> = index;
        Self::new(block, header, fetcher)
    }

    pub fn block(&self) -> &BlockMeta {
        &self.block
    }

    pub fn header(&self) -> &dyn IndexHeaderReader {
        self.header.as_ref()
    }

    pub fn fetcher(&self) -> &dyn PostingsFetcher {
        self.fetcher.as_ref()
    }

    /// The postings last expanded by this reader.
    pub fn cached_postings(&self) -> Option<&[SeriesRef]> {
        self.postings.as_deref()
    }

    pub(crate) fn set_cached_postings(&mut self, postings: Vec<SeriesRef>) {
        self.postings = Some(postings);
    }

    /// Compiles `matchers` into posting groups and expands them, lazily when enabled.
    /// Fails with [`PostingsError::InvalidConfig`](crate::error::PostingsError::InvalidConfig)
    /// before touching the index if `options` are out of range.
    pub fn expanded_postings(
        &mut self,
        ctx: &QueryContext,
        matchers: &[LabelMatcher],
        limiter: &dyn BytesLimiter,
        options: &LazyPostingsOptions,
        metrics: &dyn LazyPostingsMetrics,
        tenant: &str,
    ) -> PostingsResult<LazyExpandedPostings> {
        options.validate()?;
        let mut groups = matchers_to_posting_groups(self.header(), matchers)?;
        if groups.is_empty() {
            return Ok(LazyExpandedPostings::empty());
        }
        let add_all_postings = add_all_postings_group_if_needed(&mut groups);
        fetch_lazy_expanded_postings(
            ctx,
            groups,
            self,
            limiter,
            add_all_postings,
            options,
            metrics,
            tenant,
        )
    }
}
