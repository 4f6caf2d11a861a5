pub mod index;

/// Reference to a series inside a block's index.
pub type SeriesRef = u64;
