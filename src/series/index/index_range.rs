use crate::common::constants::{POSTINGS_HEADER_SIZE, POSTING_ENTRY_SIZE};

/// Byte range of a postings list inside the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

/// Returned by the index header for keys that do not exist in the block.
pub const NOT_FOUND_RANGE: IndexRange = IndexRange { start: -1, end: -1 };

impl IndexRange {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_not_found(&self) -> bool {
        *self == NOT_FOUND_RANGE
    }

    /// A found range that does not cover any bytes points at inconsistent index metadata.
    pub fn is_malformed(&self) -> bool {
        !self.is_not_found() && self.end <= self.start
    }

    pub fn len(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Number of postings in the list. Each range starts with the 4 byte entry count
    /// followed by one 4 byte entry per posting.
    pub fn postings_count(&self) -> i64 {
        self.len().saturating_sub(POSTINGS_HEADER_SIZE) / POSTING_ENTRY_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(IndexRange::new(0, 4), 0)]
    #[test_case(IndexRange::new(100, 108), 1)]
    #[test_case(IndexRange::new(8, 4012), 1000)]
    fn test_postings_count(range: IndexRange, expected: i64) {
        assert_eq!(range.postings_count(), expected);
    }

    #[test]
    fn test_huge_ranges_do_not_overflow() {
        let range = IndexRange::new(-10, i64::MAX);
        assert_eq!(range.len(), i64::MAX);
        assert_eq!(range.postings_count(), (i64::MAX - 4) / 4);
        assert_eq!(IndexRange::new(i64::MIN, 0).len(), i64::MAX);
    }

    #[test]
    fn test_not_found_and_malformed() {
        assert!(NOT_FOUND_RANGE.is_not_found());
        assert!(!NOT_FOUND_RANGE.is_malformed());
        assert!(IndexRange::new(10, 10).is_malformed());
        assert!(IndexRange::new(10, 2).is_malformed());
        assert!(!IndexRange::new(10, 18).is_malformed());
    }
}
