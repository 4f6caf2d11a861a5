//! Lazy posting expansion for time series block index readers.
//!
//! A query's label matchers are compiled into one [`PostingGroup`](series::index::PostingGroup)
//! per label name. Before fetching postings, a cost model decides which groups are fetched from
//! the index and which are cheaper to apply to the fetched series afterwards. The fetched
//! postings are then merged into the candidate series references of the query.
pub mod common;
pub mod config;
pub mod error;
pub mod labels;
pub mod series;

pub use config::LazyPostingsOptions;
pub use error::{PostingsError, PostingsResult};
