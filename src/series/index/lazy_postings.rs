use super::limiter::BytesLimiter;
use super::metrics::LazyPostingsMetrics;
use super::planner::{optimize_postings_fetch_by_downloaded_bytes, PlanResult};
use super::posting_group::PostingGroup;
use super::postings::{empty_postings, expand_postings, intersect, merge, without, BoxedPostings};
use super::reader::BucketIndexReader;
use crate::common::logging::{log_debug, log_warning};
use crate::common::QueryContext;
use crate::config::LazyPostingsOptions;
use crate::error::{PostingsError, PostingsResult};
use crate::labels::{Label, LabelMatcher};
use crate::series::SeriesRef;
use smallvec::SmallVec;

/// Expanded postings (series refs) of a query. When lazy posting expansion kicked in, it also
/// holds the matchers that still have to be applied to the series at filtering time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LazyExpandedPostings {
    pub postings: Vec<SeriesRef>,
    pub matchers: Vec<LabelMatcher>,
}

impl LazyExpandedPostings {
    pub fn new(postings: Vec<SeriesRef>, matchers: Vec<LabelMatcher>) -> Self {
        Self { postings, matchers }
    }

    /// The canonical result of a query that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lazy_expanded(&self) -> bool {
        !self.matchers.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// A fetched postings list paired with the key it was requested for.
pub struct FetchedPostings {
    pub key: Label,
    pub postings: Option<BoxedPostings>,
}

/// Expands the postings of `groups`, deferring the groups that are cheaper to apply to the
/// fetched series than to fetch.
///
/// Planning is skipped when lazy expansion is disabled, when the query only has negative
/// matchers (`add_all_postings`), when the block has no estimated series size, or when there is
/// a single group.
#[allow(clippy::too_many_arguments)]
pub fn fetch_lazy_expanded_postings(
    ctx: &QueryContext,
    groups: Vec<PostingGroup>,
    reader: &mut BucketIndexReader,
    limiter: &dyn BytesLimiter,
    add_all_postings: bool,
    options: &LazyPostingsOptions,
    metrics: &dyn LazyPostingsMetrics,
    tenant: &str,
) -> PostingsResult<LazyExpandedPostings> {
    let mut groups = groups;
    let series_max_size = reader.block().estimated_max_series_size;

    if options.enabled && !add_all_postings && series_max_size > 0 && groups.len() > 1 {
        let plan = optimize_postings_fetch_by_downloaded_bytes(
            reader.header(),
            groups,
            i64::try_from(series_max_size).unwrap_or(i64::MAX),
            options.series_match_ratio,
            options.posting_group_max_key_series_ratio,
            metrics,
        )?;
        groups = match plan {
            PlanResult::Planned(groups) | PlanResult::Unoptimized(groups) => groups,
            PlanResult::Empty => return Ok(LazyExpandedPostings::empty()),
        };
    }

    let (postings, matchers) =
        fetch_and_expand_posting_groups(ctx, reader, &groups, limiter, tenant)?;
    // an empty base set stays empty whatever the lazy matchers are
    if postings.is_empty() {
        return Ok(LazyExpandedPostings::empty());
    }
    Ok(LazyExpandedPostings::new(postings, matchers))
}

/// Returns the keys to fetch and the matchers of lazy groups.
///
/// Postings are returned by the fetcher in key order, with nothing else to pair them with, so
/// [`merge_fetched_postings`] must walk the groups in exactly this order.
pub fn keys_to_fetch_from_posting_groups(
    groups: &[PostingGroup],
) -> (Vec<Label>, Vec<LabelMatcher>) {
    let mut lazy_matchers = Vec::new();
    let mut keys = Vec::new();
    for group in groups {
        if group.lazy {
            lazy_matchers.extend(group.matchers.iter().cloned());
            continue;
        }
        let add = group.add_keys.iter();
        let remove = group.remove_keys.iter();
        keys.extend(add.chain(remove).map(|value| Label::new(group.name.as_str(), value)));
    }
    (keys, lazy_matchers)
}

pub fn fetch_and_expand_posting_groups(
    ctx: &QueryContext,
    reader: &mut BucketIndexReader,
    groups: &[PostingGroup],
    limiter: &dyn BytesLimiter,
    tenant: &str,
) -> PostingsResult<(Vec<SeriesRef>, Vec<LabelMatcher>)> {
    let (keys, lazy_matchers) = keys_to_fetch_from_posting_groups(groups);

    let fetched = reader
        .fetcher()
        .fetch_postings(ctx, &keys, limiter, tenant)
        .map_err(PostingsError::fetch)?;
    if fetched.len() != keys.len() {
        return Err(PostingsError::fetch(PostingsError::FetchedPostingsMismatch {
            expected: keys.len(),
            actual: fetched.len(),
        }));
    }
    let fetched: Vec<FetchedPostings> = keys
        .into_iter()
        .zip(fetched)
        .map(|(key, postings)| FetchedPostings { key, postings })
        .collect();

    let result = merge_fetched_postings(fetched, groups);
    ctx.err()?;

    let postings = expand_postings(ctx, result).map_err(PostingsError::expand)?;
    reader.set_cached_postings(postings.clone());
    Ok((postings, lazy_matchers))
}

/// Combines fetched postings: the union of each eager group's add keys is intersected with
/// the others, and the union of all remove keys is subtracted from the result.
pub fn merge_fetched_postings(
    fetched: Vec<FetchedPostings>,
    groups: &[PostingGroup],
) -> BoxedPostings {
    let mut fetched = fetched.into_iter();
    let mut group_adds = Vec::with_capacity(groups.len());
    let mut group_removals = Vec::new();

    for group in groups.iter().filter(|g| !g.lazy) {
        // an empty set must not be intersected
        if !group.add_keys.is_empty() {
            let mut to_merge: SmallVec<BoxedPostings, 4> = SmallVec::new();
            for value in &group.add_keys {
                to_merge.push(next_fetched(&mut fetched, &group.name, value));
            }
            group_adds.push(merge(to_merge));
        }
        for value in &group.remove_keys {
            group_removals.push(next_fetched(&mut fetched, &group.name, value));
        }
    }

    without(intersect(group_adds), merge(group_removals))
}

fn next_fetched<I>(fetched: &mut I, name: &str, value: &str) -> BoxedPostings
where
    I: Iterator<Item = FetchedPostings>,
{
    let Some(FetchedPostings { key, postings }) = fetched.next() else {
        log_warning(format!("missing fetched postings for {name}=\"{value}\""));
        return empty_postings();
    };
    debug_assert!(
        key.name == name && key.value == value,
        "fetched postings for {key} while expecting {name}=\"{value}\""
    );
    postings.unwrap_or_else(|| {
        log_debug(format!("nil postings fetched for {key}"));
        empty_postings()
    })
}
