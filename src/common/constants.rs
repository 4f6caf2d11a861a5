/// Size in bytes of the entry-count field at the start of every postings list.
pub const POSTINGS_HEADER_SIZE: i64 = 4;
/// Size in bytes of a single posting (series reference) inside a postings list.
pub const POSTING_ENTRY_SIZE: i64 = 4;

/// Label name of the key holding the postings for every series in a block.
pub const ALL_POSTINGS_LABEL_NAME: &str = "";
/// Label value of the key holding the postings for every series in a block.
pub const ALL_POSTINGS_LABEL_VALUE: &str = "";

pub const DEFAULT_SERIES_MATCH_RATIO: f64 = 0.5;
pub const DEFAULT_POSTING_GROUP_MAX_KEY_SERIES_RATIO: f64 = 100.0;
