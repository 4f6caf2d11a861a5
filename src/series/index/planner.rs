use super::metrics::{LazyPostingsMetrics, LazyReason};
use super::posting_group::PostingGroup;
use super::reader::IndexHeaderReader;
use crate::common::constants::POSTING_ENTRY_SIZE;
use crate::common::logging::{log_debug, log_error};
use crate::error::{PostingsError, PostingsResult};

/// Outcome of planning which posting groups to fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanResult {
    /// Nothing was decided, every group is fetched. Groups are returned as received when the
    /// index metadata looked inconsistent.
    Unoptimized(Vec<PostingGroup>),
    /// Groups sorted by cardinality with the ones to expand lazily marked.
    Planned(Vec<PostingGroup>),
    /// A group adding postings has none in the index, so nothing can match.
    Empty,
}

impl PlanResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, PlanResult::Empty)
    }

    pub fn into_groups(self) -> Option<Vec<PostingGroup>> {
        match self {
            PlanResult::Unoptimized(groups) | PlanResult::Planned(groups) => Some(groups),
            PlanResult::Empty => None,
        }
    }
}

enum Cardinalities {
    Collected(Vec<(i64, usize)>),
    Malformed,
    Empty,
}

/// Collects (cardinality, existent keys) of each group from its index byte ranges.
fn collect_cardinalities(
    reader: &dyn IndexHeaderReader,
    groups: &[PostingGroup],
) -> PostingsResult<Cardinalities> {
    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let ranges = reader
            .postings_offsets(&group.name, group.cost_keys())
            .map_err(|e| PostingsError::range_resolution(group.name.as_str(), e))?;

        let mut cardinality: i64 = 0;
        let mut existent_keys = 0;
        for range in ranges {
            if range.is_not_found() {
                continue;
            }
            if range.is_malformed() {
                log_error("invalid index range, fallback to non lazy posting optimization");
                return Ok(Cardinalities::Malformed);
            }
            existent_keys += 1;
            cardinality = cardinality.saturating_add(range.postings_count());
        }
        // Missing remove keys are a noop, but a group adding only missing keys matches nothing.
        if !group.add_keys.is_empty() && existent_keys == 0 {
            return Ok(Cardinalities::Empty);
        }
        result.push((cardinality, existent_keys));
    }
    Ok(Cardinalities::Collected(result))
}

/// Decides which posting groups to fetch now and which to apply lazily to fetched series, so
/// that the total of downloaded postings and series bytes is as small as possible.
///
/// Groups are visited by increasing cardinality. Fetching one group of `P1` postings and its
/// series costs `P1 * 4 + P1 * S`, where `S` is the maximum series size. Every additional
/// intersected group of `Pn` postings keeps a fraction `R` of the matched series, so it pays off
/// only while `Pn * 4 < P1 * S * R^(n - 2) * (1 - R)`. The left side grows with the sort order and
/// the right side shrinks with every step, so once a group does not pay off, no later group does
/// either and the rest is marked lazy.
pub fn optimize_postings_fetch_by_downloaded_bytes(
    reader: &dyn IndexHeaderReader,
    mut groups: Vec<PostingGroup>,
    series_max_size: i64,
    series_match_ratio: f64,
    max_key_series_ratio: f64,
    metrics: &dyn LazyPostingsMetrics,
) -> PostingsResult<PlanResult> {
    if groups.len() <= 1 {
        return Ok(PlanResult::Unoptimized(groups));
    }

    let cardinalities = match collect_cardinalities(reader, &groups)? {
        Cardinalities::Collected(cardinalities) => cardinalities,
        Cardinalities::Malformed => return Ok(PlanResult::Unoptimized(groups)),
        Cardinalities::Empty => return Ok(PlanResult::Empty),
    };
    for (group, (cardinality, existent_keys)) in groups.iter_mut().zip(cardinalities) {
        group.cardinality = cardinality;
        group.existent_keys = existent_keys;
    }

    groups.sort_by(|a, b| {
        a.cardinality
            .cmp(&b.cardinality)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut negative_cardinalities: i64 = 0;
    let mut i = 0;
    while i < groups.len() && groups[i].add_all {
        negative_cardinalities = negative_cardinalities.saturating_add(groups[i].cardinality);
        i += 1;
    }
    // At least one group adding postings is always fetched. Nothing to decide if it is the last.
    if i + 1 >= groups.len() {
        return Ok(PlanResult::Unoptimized(groups));
    }

    let mut series_matched = groups[i].cardinality
        - (negative_cardinalities as f64 * series_match_ratio).ceil() as i64;
    let max_series_matched = series_matched;
    i += 1;

    while i < groups.len() {
        // Unlikely, but nothing is left to match.
        if series_matched <= 0 {
            break;
        }
        let group = &mut groups[i];
        if max_key_series_ratio > 0.0
            && max_series_matched > 0
            && group.existent_keys as f64 / max_series_matched as f64 > max_key_series_ratio
        {
            mark_posting_group_lazy(group, LazyReason::KeysLimit, metrics);
            i += 1;
            continue;
        }

        let underfetched_series_size = if group.add_all {
            // a negative group removes a fraction of at most the currently matched series
            let underfetched_series = (group.cardinality.min(series_matched) as f64
                * series_match_ratio)
                .ceil() as i64;
            series_matched -= underfetched_series;
            underfetched_series.saturating_mul(series_max_size)
        } else {
            let underfetched_series =
                (series_matched as f64 * (1.0 - series_match_ratio)).ceil() as i64;
            let size = series_max_size.saturating_mul(underfetched_series);
            series_matched = (series_matched as f64 * series_match_ratio).ceil() as i64;
            size
        };

        if group.cardinality.saturating_mul(POSTING_ENTRY_SIZE) > underfetched_series_size {
            break;
        }
        i += 1;
    }

    if i < groups.len() {
        log_debug(format!(
            "fetching postings of {} groups, {} groups lazy by postings size",
            i,
            groups.len() - i
        ));
    }
    for group in groups[i..].iter_mut() {
        mark_posting_group_lazy(group, LazyReason::PostingsSize, metrics);
    }
    Ok(PlanResult::Planned(groups))
}

fn mark_posting_group_lazy(
    group: &mut PostingGroup,
    reason: LazyReason,
    metrics: &dyn LazyPostingsMetrics,
) {
    group.lazy = true;
    let bytes = group.cardinality.saturating_mul(POSTING_ENTRY_SIZE).max(0);
    metrics.add_lazy_posting_bytes(bytes as u64);
    metrics.inc_lazy_posting_groups(reason);
}
