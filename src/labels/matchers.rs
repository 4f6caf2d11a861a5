use crate::error::{PostingsError, PostingsResult};
use regex::Regex;
use std::fmt::Display;
use strum_macros::{Display as StrumDisplay, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum MatchOp {
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "=~")]
    RegexEqual,
    #[strum(serialize = "!~")]
    RegexNotEqual,
}

impl MatchOp {
    pub fn is_regex(&self) -> bool {
        matches!(self, MatchOp::RegexEqual | MatchOp::RegexNotEqual)
    }
}

/// A single label matcher from a series selector, e.g. `job=~"api|web"`.
///
/// Matchers are carried through posting planning unchanged so that the ones belonging to
/// lazily expanded posting groups can be applied to series labels after the fetch.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
    regex: Option<Regex>,
}

impl LabelMatcher {
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> PostingsResult<Self> {
        let value = value.into();
        let regex = if op.is_regex() {
            // anchored, as in Prometheus
            let anchored = format!("^(?:{value})$");
            let re = Regex::new(&anchored)
                .map_err(|e| PostingsError::InvalidMatcher(format!("{value}: {e}")))?;
            Some(re)
        } else {
            None
        };
        Ok(Self {
            name: name.into(),
            op,
            value,
            regex,
        })
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Equal,
            value: value.into(),
            regex: None,
        }
    }

    pub fn not_equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::NotEqual,
            value: value.into(),
            regex: None,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self.op {
            MatchOp::Equal => self.value == value,
            MatchOp::NotEqual => self.value != value,
            MatchOp::RegexEqual => self.regex.as_ref().is_some_and(|re| re.is_match(value)),
            MatchOp::RegexNotEqual => !self.regex.as_ref().is_some_and(|re| re.is_match(value)),
        }
    }

    pub fn matches_empty(&self) -> bool {
        self.matches("")
    }

    /// Returns the literal values of a regex made only of alternated literals (`a|b|c`),
    /// sorted and deduplicated. Returns an empty vector for any other regex.
    pub fn set_matches(&self) -> Vec<String> {
        if !self.op.is_regex() {
            return Vec::new();
        }
        let mut values = Vec::new();
        for part in self.value.split('|') {
            if part.is_empty() || regex::escape(part) != part {
                return Vec::new();
            }
            values.push(part.to_string());
        }
        values.sort();
        values.dedup();
        values
    }
}

impl PartialEq for LabelMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.op == other.op && self.value == other.value
    }
}

impl Eq for LabelMatcher {}

impl Display for LabelMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}\"{}\"", self.name, self.op, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case(MatchOp::Equal, "a", "a", true)]
    #[test_case(MatchOp::Equal, "a", "b", false)]
    #[test_case(MatchOp::NotEqual, "a", "b", true)]
    #[test_case(MatchOp::NotEqual, "", "", false)]
    #[test_case(MatchOp::RegexEqual, "a|b", "b", true)]
    #[test_case(MatchOp::RegexEqual, "a.*", "xa", false ; "regex is anchored")]
    #[test_case(MatchOp::RegexNotEqual, "a.*", "abc", false)]
    #[test_case(MatchOp::RegexNotEqual, "a.*", "", true)]
    fn test_matches(op: MatchOp, pattern: &str, value: &str, expected: bool) {
        let m = LabelMatcher::new(op, "l", pattern).unwrap();
        assert_eq!(m.matches(value), expected);
    }

    #[test_case("a|b|c", &["a", "b", "c"])]
    #[test_case("c|a|a", &["a", "c"] ; "sorted and deduplicated")]
    #[test_case("a.*", &[])]
    #[test_case("a|", &[] ; "empty alternative")]
    fn test_set_matches(pattern: &str, expected: &[&str]) {
        let m = LabelMatcher::new(MatchOp::RegexEqual, "l", pattern).unwrap();
        assert_eq!(m.set_matches(), expected);
    }

    #[test]
    fn test_invalid_regex() {
        let err = LabelMatcher::new(MatchOp::RegexEqual, "l", "(").unwrap_err();
        assert!(matches!(err, PostingsError::InvalidMatcher(_)));
    }

    #[test]
    fn test_display_and_parse_op() {
        let m = LabelMatcher::new(MatchOp::RegexNotEqual, "job", "api").unwrap();
        assert_eq!(m.to_string(), "job!~\"api\"");
        assert_eq!(MatchOp::from_str("=~").unwrap(), MatchOp::RegexEqual);
    }
}
