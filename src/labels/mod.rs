pub mod matchers;

use std::fmt::Display;

pub use matchers::{LabelMatcher, MatchOp};

use crate::common::constants::{ALL_POSTINGS_LABEL_NAME, ALL_POSTINGS_LABEL_VALUE};

/// A (label name, label value) pair. Used as the key of a postings list in the index.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The key under which the postings of every series in a block are stored.
    pub fn all_postings() -> Self {
        Self::new(ALL_POSTINGS_LABEL_NAME, ALL_POSTINGS_LABEL_VALUE)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=\"{}\"", self.name, self.value)
    }
}
