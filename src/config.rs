use crate::common::constants::{
    DEFAULT_POSTING_GROUP_MAX_KEY_SERIES_RATIO, DEFAULT_SERIES_MATCH_RATIO,
};
use crate::error::{PostingsError, PostingsResult};
use serde::{Deserialize, Serialize};

/// Options controlling lazy posting expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyPostingsOptions {
    /// Enables the cost based decision of which posting groups to fetch lazily.
    pub enabled: bool,
    /// Assumed fraction of candidate series left after intersecting one more posting group.
    pub series_match_ratio: f64,
    /// A posting group whose existent key count divided by the estimated number of matched
    /// series exceeds this ratio is fetched lazily. 0 disables the check.
    pub posting_group_max_key_series_ratio: f64,
}

impl Default for LazyPostingsOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            series_match_ratio: DEFAULT_SERIES_MATCH_RATIO,
            posting_group_max_key_series_ratio: DEFAULT_POSTING_GROUP_MAX_KEY_SERIES_RATIO,
        }
    }
}

impl LazyPostingsOptions {
    pub fn validate(&self) -> PostingsResult<()> {
        if !(self.series_match_ratio > 0.0 && self.series_match_ratio < 1.0) {
            return Err(PostingsError::InvalidConfig(format!(
                "series_match_ratio must be between 0 and 1 (exclusive), got {}",
                self.series_match_ratio
            )));
        }
        if self.posting_group_max_key_series_ratio.is_nan()
            || self.posting_group_max_key_series_ratio < 0.0
        {
            return Err(PostingsError::InvalidConfig(format!(
                "posting_group_max_key_series_ratio must not be negative, got {}",
                self.posting_group_max_key_series_ratio
            )));
        }
        Ok(())
    }
}
