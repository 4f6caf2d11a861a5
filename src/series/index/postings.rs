use crate::common::QueryContext;
use crate::error::PostingsResult;
use crate::series::SeriesRef;
use min_max_heap::MinMaxHeap;

/// How many references are drained between two context checks during expansion.
const EXPAND_CONTEXT_CHECK_INTERVAL: usize = 1 << 14;

/// A lazy, strictly increasing sequence of series references.
pub trait Postings: Iterator<Item = SeriesRef> + Send {
    /// Consumes references until one `>= target` is found and returns it, or `None` once the
    /// sequence is exhausted.
    fn seek(&mut self, target: SeriesRef) -> Option<SeriesRef> {
        while let Some(series_ref) = self.next() {
            if series_ref >= target {
                return Some(series_ref);
            }
        }
        None
    }
}

pub type BoxedPostings = Box<dyn Postings>;

impl<P: Postings + ?Sized> Postings for Box<P> {
    fn seek(&mut self, target: SeriesRef) -> Option<SeriesRef> {
        (**self).seek(target)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPostings;

impl Iterator for EmptyPostings {
    type Item = SeriesRef;

    fn next(&mut self) -> Option<Self::Item> {
        None
    }
}

impl Postings for EmptyPostings {
    fn seek(&mut self, _target: SeriesRef) -> Option<SeriesRef> {
        None
    }
}

/// Postings backed by an already sorted vector of references.
#[derive(Debug, Default, Clone)]
pub struct ListPostings {
    refs: Vec<SeriesRef>,
    pos: usize,
}

impl ListPostings {
    pub fn new(refs: Vec<SeriesRef>) -> Self {
        debug_assert!(refs.windows(2).all(|w| w[0] < w[1]));
        Self { refs, pos: 0 }
    }
}

impl Iterator for ListPostings {
    type Item = SeriesRef;

    fn next(&mut self) -> Option<Self::Item> {
        let series_ref = self.refs.get(self.pos).copied()?;
        self.pos += 1;
        Some(series_ref)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.refs.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl Postings for ListPostings {
    fn seek(&mut self, target: SeriesRef) -> Option<SeriesRef> {
        let rest = &self.refs[self.pos..];
        self.pos += rest.partition_point(|&r| r < target);
        self.next()
    }
}

/// K-way union of postings.
pub struct MergedPostings {
    its: Vec<BoxedPostings>,
    heads: MinMaxHeap<(SeriesRef, usize)>,
    initialized: bool,
}

impl MergedPostings {
    fn new(its: Vec<BoxedPostings>) -> Self {
        let heads = MinMaxHeap::with_capacity(its.len());
        Self {
            its,
            heads,
            initialized: false,
        }
    }

    fn init(&mut self) {
        if self.initialized {
            return;
        }
        for (i, it) in self.its.iter_mut().enumerate() {
            if let Some(series_ref) = it.next() {
                self.heads.push((series_ref, i));
            }
        }
        self.initialized = true;
    }

    fn advance(&mut self, i: usize) {
        if let Some(series_ref) = self.its[i].next() {
            self.heads.push((series_ref, i));
        }
    }
}

impl Iterator for MergedPostings {
    type Item = SeriesRef;

    fn next(&mut self) -> Option<Self::Item> {
        self.init();
        let (current, i) = self.heads.pop_min()?;
        self.advance(i);
        // the same reference may be at the head of several lists
        while let Some(&(series_ref, j)) = self.heads.peek_min() {
            if series_ref != current {
                break;
            }
            self.heads.pop_min();
            self.advance(j);
        }
        Some(current)
    }
}

impl Postings for MergedPostings {
    fn seek(&mut self, target: SeriesRef) -> Option<SeriesRef> {
        self.init();
        while let Some(&(series_ref, i)) = self.heads.peek_min() {
            if series_ref >= target {
                break;
            }
            self.heads.pop_min();
            if let Some(next) = self.its[i].seek(target) {
                self.heads.push((next, i));
            }
        }
        self.next()
    }
}

/// Intersection of postings.
pub struct IntersectPostings {
    its: Vec<BoxedPostings>,
    heads: Vec<Option<SeriesRef>>,
    done: bool,
}

impl IntersectPostings {
    fn new(its: Vec<BoxedPostings>) -> Self {
        let heads = vec![None; its.len()];
        Self {
            done: its.is_empty(),
            its,
            heads,
        }
    }
}

impl Iterator for IntersectPostings {
    type Item = SeriesRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(mut target) = self.its[0].next() else {
            self.done = true;
            return None;
        };
        self.heads[0] = Some(target);

        'search: loop {
            for i in 0..self.its.len() {
                match self.heads[i] {
                    Some(head) if head == target => continue,
                    Some(head) if head > target => {
                        target = head;
                        continue 'search;
                    }
                    _ => {}
                }
                match self.its[i].seek(target) {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(head) => {
                        self.heads[i] = Some(head);
                        if head > target {
                            target = head;
                            continue 'search;
                        }
                    }
                }
            }
            return Some(target);
        }
    }
}

impl Postings for IntersectPostings {}

/// References of `full` that are not present in `remove`.
pub struct RemovedPostings {
    full: BoxedPostings,
    remove: BoxedPostings,
    remove_head: Option<SeriesRef>,
    remove_exhausted: bool,
}

impl RemovedPostings {
    fn new(full: BoxedPostings, remove: BoxedPostings) -> Self {
        Self {
            full,
            remove,
            remove_head: None,
            remove_exhausted: false,
        }
    }

    fn keep(&mut self, series_ref: SeriesRef) -> bool {
        if self.remove_exhausted {
            return true;
        }
        if self.remove_head.is_none_or(|head| head < series_ref) {
            match self.remove.seek(series_ref) {
                Some(head) => self.remove_head = Some(head),
                None => {
                    self.remove_exhausted = true;
                    return true;
                }
            }
        }
        self.remove_head != Some(series_ref)
    }
}

impl Iterator for RemovedPostings {
    type Item = SeriesRef;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let series_ref = self.full.next()?;
            if self.keep(series_ref) {
                return Some(series_ref);
            }
        }
    }
}

impl Postings for RemovedPostings {
    fn seek(&mut self, target: SeriesRef) -> Option<SeriesRef> {
        let mut series_ref = self.full.seek(target)?;
        loop {
            if self.keep(series_ref) {
                return Some(series_ref);
            }
            series_ref = self.full.next()?;
        }
    }
}

pub fn empty_postings() -> BoxedPostings {
    Box::new(EmptyPostings)
}

pub fn list_postings(refs: Vec<SeriesRef>) -> BoxedPostings {
    Box::new(ListPostings::new(refs))
}

/// Union of all `its`. Returns empty postings for no input.
pub fn merge<I>(its: I) -> BoxedPostings
where
    I: IntoIterator<Item = BoxedPostings>,
{
    let mut its: Vec<BoxedPostings> = its.into_iter().collect();
    match its.len() {
        0 => empty_postings(),
        1 => its.pop().unwrap_or_else(empty_postings),
        _ => Box::new(MergedPostings::new(its)),
    }
}

/// Intersection of all `its`. Returns empty postings for no input.
pub fn intersect<I>(its: I) -> BoxedPostings
where
    I: IntoIterator<Item = BoxedPostings>,
{
    let mut its: Vec<BoxedPostings> = its.into_iter().collect();
    match its.len() {
        0 => empty_postings(),
        1 => its.pop().unwrap_or_else(empty_postings),
        _ => Box::new(IntersectPostings::new(its)),
    }
}

/// Set difference `full - remove`.
pub fn without(full: BoxedPostings, remove: BoxedPostings) -> BoxedPostings {
    Box::new(RemovedPostings::new(full, remove))
}

/// Drains `postings` into a vector, failing if `ctx` is cancelled or past its deadline
/// before draining completes.
pub fn expand_postings<P: Postings>(
    ctx: &QueryContext,
    postings: P,
) -> PostingsResult<Vec<SeriesRef>> {
    ctx.err()?;
    let mut result = Vec::with_capacity(postings.size_hint().0);
    for (i, series_ref) in postings.enumerate() {
        if i > 0 && i % EXPAND_CONTEXT_CHECK_INTERVAL == 0 {
            ctx.err()?;
        }
        result.push(series_ref);
    }
    ctx.err()?;
    Ok(result)
}
