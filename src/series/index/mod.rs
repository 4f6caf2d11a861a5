mod index_range;
mod lazy_postings;
mod limiter;
mod memory_index;
mod metrics;
mod planner;
mod posting_group;
mod postings;
mod reader;

pub use index_range::*;
pub use lazy_postings::*;
pub use limiter::*;
pub use memory_index::*;
pub use metrics::*;
pub use planner::*;
pub use posting_group::*;
pub use postings::*;
pub use reader::*;
