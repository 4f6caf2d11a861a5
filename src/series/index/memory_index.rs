use super::index_range::{IndexRange, NOT_FOUND_RANGE};
use super::limiter::BytesLimiter;
use super::postings::{list_postings, BoxedPostings};
use super::reader::{IndexHeaderReader, PostingsFetcher};
use crate::common::constants::{POSTINGS_HEADER_SIZE, POSTING_ENTRY_SIZE};
use crate::common::QueryContext;
use crate::error::PostingsResult;
use crate::labels::Label;
use crate::series::SeriesRef;
use ahash::AHashMap;
use croaring::Bitmap64;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub type PostingsBitmap = Bitmap64;

/// In-memory inverted index laid out like a block index: postings lists are stored one after
/// another in key order, each prefixed by a 4 byte entry count and holding 4 bytes per posting.
///
/// Implements both [`IndexHeaderReader`] and [`PostingsFetcher`], so it can stand in for a
/// block's index in a [`BucketIndexReader`](super::reader::BucketIndexReader).
#[derive(Default)]
pub struct MemoryIndex {
    /// Map from (label name, label value) to the set of series ids. The all-postings key
    /// holds every series.
    label_index: BTreeMap<Label, PostingsBitmap>,
    /// Ranges reported instead of the computed layout.
    range_overrides: AHashMap<Label, IndexRange>,
    fetch_calls: AtomicUsize,
    fetched_keys: Mutex<Vec<Label>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_posting_for_label_value(&mut self, id: SeriesRef, name: &str, value: &str) {
        self.label_index
            .entry(Label::all_postings())
            .or_default()
            .add(id);
        self.label_index
            .entry(Label::new(name, value))
            .or_default()
            .add(id);
    }

    pub fn add_series(&mut self, id: SeriesRef, labels: &[(&str, &str)]) {
        for (name, value) in labels {
            self.add_posting_for_label_value(id, name, value);
        }
    }

    /// Removes a series from the postings of the given labels, dropping lists that become empty.
    pub fn remove_series(&mut self, id: SeriesRef, labels: &[(&str, &str)]) {
        for (name, value) in labels {
            let key = Label::new(*name, *value);
            if let Some(bitmap) = self.label_index.get_mut(&key) {
                bitmap.remove(id);
                if bitmap.is_empty() {
                    self.label_index.remove(&key);
                }
            }
        }
        let all = Label::all_postings();
        if let Some(bitmap) = self.label_index.get_mut(&all) {
            bitmap.remove(id);
        }
    }

    /// Overrides the byte range reported for a key, e.g. to simulate inconsistent metadata.
    pub fn set_range_override(&mut self, name: &str, value: &str, range: IndexRange) {
        self.range_overrides.insert(Label::new(name, value), range);
    }

    pub fn postings_for_label_value(&self, name: &str, value: &str) -> Vec<SeriesRef> {
        let key = Label::new(name, value);
        self.label_index
            .get(&key)
            .map(|bitmap| bitmap.iter().collect())
            .unwrap_or_default()
    }

    pub fn count(&self) -> u64 {
        self.label_index
            .get(&Label::all_postings())
            .map_or(0, |bitmap| bitmap.cardinality())
    }

    /// Number of times postings were fetched from this index.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    /// Every key fetched so far, in request order.
    pub fn fetched_keys(&self) -> Vec<Label> {
        self.fetched_keys
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }

    fn layout(&self) -> AHashMap<&Label, IndexRange> {
        let mut offset = 0;
        let mut layout = AHashMap::with_capacity(self.label_index.len());
        for (key, bitmap) in self.label_index.iter() {
            let len = POSTINGS_HEADER_SIZE + POSTING_ENTRY_SIZE * bitmap.cardinality() as i64;
            layout.insert(key, IndexRange::new(offset, offset + len));
            offset += len;
        }
        layout
    }

    fn range_for(&self, layout: &AHashMap<&Label, IndexRange>, key: &Label) -> IndexRange {
        if let Some(range) = self.range_overrides.get(key) {
            return *range;
        }
        layout.get(key).copied().unwrap_or(NOT_FOUND_RANGE)
    }
}

impl IndexHeaderReader for MemoryIndex {
    fn postings_offsets(&self, name: &str, values: &[String]) -> PostingsResult<Vec<IndexRange>> {
        let layout = self.layout();
        let ranges = values
            .iter()
            .map(|value| self.range_for(&layout, &Label::new(name, value.as_str())))
            .collect();
        Ok(ranges)
    }

    fn label_values(&self, name: &str) -> PostingsResult<Vec<String>> {
        let values = self
            .label_index
            .iter()
            .filter(|(key, bitmap)| key.name == name && !bitmap.is_empty())
            .map(|(key, _)| key.value.clone())
            .collect();
        Ok(values)
    }
}

impl PostingsFetcher for MemoryIndex {
    fn fetch_postings(
        &self,
        ctx: &QueryContext,
        keys: &[Label],
        limiter: &dyn BytesLimiter,
        _tenant: &str,
    ) -> PostingsResult<Vec<Option<BoxedPostings>>> {
        ctx.err()?;
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut fetched) = self.fetched_keys.lock() {
            fetched.extend_from_slice(keys);
        }

        let layout = self.layout();
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bitmap) = self.label_index.get(key) else {
                result.push(None);
                continue;
            };
            let range = self.range_for(&layout, key);
            limiter.reserve(range.len().max(0) as u64)?;
            result.push(Some(list_postings(bitmap.iter().collect())));
        }
        Ok(result)
    }
}
