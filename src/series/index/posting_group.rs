use super::reader::IndexHeaderReader;
use crate::common::constants::{ALL_POSTINGS_LABEL_NAME, ALL_POSTINGS_LABEL_VALUE};
use crate::error::PostingsResult;
use crate::labels::{LabelMatcher, MatchOp};
use std::collections::BTreeMap;

/// Postings to add and remove for one label name of a query.
///
/// Postings of the add keys are unioned, and the unions of all groups are intersected.
/// Postings of the remove keys are subtracted from the final result. A group with `add_all`
/// set only contributes removals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingGroup {
    pub name: String,
    pub add_all: bool,
    pub add_keys: Vec<String>,
    pub remove_keys: Vec<String>,
    /// Estimated number of postings, derived from the index byte ranges of the keys.
    pub cardinality: i64,
    /// Number of requested keys that exist in the index.
    pub existent_keys: usize,
    /// Set when the group is applied to series labels after the fetch instead of being fetched.
    pub lazy: bool,
    pub matchers: Vec<LabelMatcher>,
}

impl PostingGroup {
    pub fn new(
        add_all: bool,
        name: impl Into<String>,
        add_keys: Vec<String>,
        remove_keys: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            add_all,
            add_keys: sorted_keys(add_keys),
            remove_keys: sorted_keys(remove_keys),
            ..Default::default()
        }
    }

    pub fn with_add_keys<S: Into<String>>(
        name: impl Into<String>,
        keys: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(false, name, keys.into_iter().map(Into::into).collect(), Vec::new())
    }

    pub fn with_remove_keys<S: Into<String>>(
        name: impl Into<String>,
        keys: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(true, name, Vec::new(), keys.into_iter().map(Into::into).collect())
    }

    /// The group selecting every series of the block.
    pub fn all_postings() -> Self {
        Self::with_add_keys(ALL_POSTINGS_LABEL_NAME, [ALL_POSTINGS_LABEL_VALUE])
    }

    pub fn with_matchers(mut self, matchers: Vec<LabelMatcher>) -> Self {
        self.matchers = matchers;
        self
    }

    /// Keys whose byte ranges drive the cost of the group. A group has either add keys or
    /// remove keys, never both.
    pub fn cost_keys(&self) -> &[String] {
        if self.remove_keys.is_empty() {
            &self.add_keys
        } else {
            &self.remove_keys
        }
    }

    /// Merges a group on the same label name into this one.
    pub fn merge(mut self, other: PostingGroup) -> PostingGroup {
        debug_assert_eq!(self.name, other.name);
        self.matchers.extend(other.matchers);
        match (self.add_all, other.add_all) {
            (true, true) => {
                self.remove_keys = union_keys(&self.remove_keys, &other.remove_keys);
            }
            (true, false) => {
                self.add_keys = subtract_keys(&other.add_keys, &self.remove_keys);
                self.remove_keys.clear();
                self.add_all = false;
            }
            (false, true) => {
                self.add_keys = subtract_keys(&self.add_keys, &other.remove_keys);
            }
            (false, false) => {
                self.add_keys = intersect_keys(&self.add_keys, &other.add_keys);
            }
        }
        self
    }
}

fn sorted_keys(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys.dedup();
    keys
}

fn union_keys(a: &[String], b: &[String]) -> Vec<String> {
    sorted_keys(a.iter().chain(b.iter()).cloned().collect())
}

fn intersect_keys(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .filter(|key| b.binary_search(key).is_ok())
        .cloned()
        .collect()
}

fn subtract_keys(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .filter(|key| b.binary_search(key).is_err())
        .cloned()
        .collect()
}

/// Builds the posting group of a single matcher.
pub fn to_posting_group(
    reader: &dyn IndexHeaderReader,
    matcher: &LabelMatcher,
) -> PostingsResult<PostingGroup> {
    let name = matcher.name.as_str();
    let matchers = vec![matcher.clone()];

    if matcher.op == MatchOp::RegexEqual {
        let values = matcher.set_matches();
        if !values.is_empty() {
            return Ok(PostingGroup::new(false, name, values, Vec::new()).with_matchers(matchers));
        }
    }

    // A matcher selecting the empty value also selects every series without the label.
    if matcher.matches_empty() {
        match matcher.op {
            MatchOp::RegexNotEqual => {
                let values = matcher.set_matches();
                if !values.is_empty() {
                    return Ok(PostingGroup::new(true, name, Vec::new(), values)
                        .with_matchers(matchers));
                }
            }
            MatchOp::NotEqual => {
                return Ok(
                    PostingGroup::new(true, name, Vec::new(), vec![matcher.value.clone()])
                        .with_matchers(matchers),
                );
            }
            _ => {}
        }
        let to_remove: Vec<String> = reader
            .label_values(name)?
            .into_iter()
            .filter(|value| !matcher.matches(value))
            .collect();
        return Ok(PostingGroup::new(true, name, Vec::new(), to_remove).with_matchers(matchers));
    }

    if matcher.op == MatchOp::Equal {
        return Ok(
            PostingGroup::new(false, name, vec![matcher.value.clone()], Vec::new())
                .with_matchers(matchers),
        );
    }

    let to_add: Vec<String> = reader
        .label_values(name)?
        .into_iter()
        .filter(|value| matcher.matches(value))
        .collect();
    Ok(PostingGroup::new(false, name, to_add, Vec::new()).with_matchers(matchers))
}

/// Compiles matchers into one posting group per label name, sorted by name.
///
/// Returns no groups if the matchers provably select nothing.
pub fn matchers_to_posting_groups(
    reader: &dyn IndexHeaderReader,
    matchers: &[LabelMatcher],
) -> PostingsResult<Vec<PostingGroup>> {
    let mut by_name: BTreeMap<&str, BTreeMap<String, &LabelMatcher>> = BTreeMap::new();
    for matcher in matchers {
        by_name
            .entry(matcher.name.as_str())
            .or_default()
            .insert(matcher.to_string(), matcher);
    }

    let mut groups = Vec::with_capacity(by_name.len());
    for label_matchers in by_name.values() {
        let mut merged: Option<PostingGroup> = None;
        for matcher in label_matchers.values() {
            let group = to_posting_group(reader, matcher)?;
            // intersecting with an empty group yields nothing
            if !group.add_all && group.add_keys.is_empty() {
                return Ok(Vec::new());
            }
            let next = match merged.take() {
                Some(current) => current.merge(group),
                None => group,
            };
            if !next.add_all && next.add_keys.is_empty() {
                return Ok(Vec::new());
            }
            merged = Some(next);
        }
        let Some(group) = merged else {
            continue;
        };
        // matches everything, e.g. l=~".*"
        if group.add_all && group.remove_keys.is_empty() {
            continue;
        }
        groups.push(group);
    }
    Ok(groups)
}

/// Prepends the all-postings group when no group adds postings, so that removals have a
/// base to subtract from. Returns whether the group was added.
pub fn add_all_postings_group_if_needed(groups: &mut Vec<PostingGroup>) -> bool {
    if groups.iter().any(|g| !g.add_keys.is_empty()) {
        return false;
    }
    groups.insert(0, PostingGroup::all_postings());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::index::memory_index::MemoryIndex;

    fn test_index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index.add_series(1, &[("job", "api"), ("env", "prod")]);
        index.add_series(2, &[("job", "web"), ("env", "prod")]);
        index.add_series(3, &[("job", "db"), ("env", "dev")]);
        index.add_series(4, &[("env", "dev")]);
        index
    }

    fn matcher(op: MatchOp, name: &str, value: &str) -> LabelMatcher {
        LabelMatcher::new(op, name, value).unwrap()
    }

    #[test]
    fn test_new_sorts_and_dedups_keys() {
        let g = PostingGroup::with_add_keys("job", ["web", "api", "web"]);
        assert_eq!(g.add_keys, vec!["api", "web"]);
        assert!(!g.add_all);
        assert_eq!(g.cost_keys(), &["api".to_string(), "web".to_string()]);

        let g = PostingGroup::with_remove_keys("job", ["db"]);
        assert!(g.add_all);
        assert_eq!(g.cost_keys(), &["db".to_string()]);
    }

    #[test]
    fn test_to_posting_group_equal() {
        let index = test_index();
        let g = to_posting_group(&index, &matcher(MatchOp::Equal, "job", "api")).unwrap();
        assert_eq!(g.add_keys, vec!["api"]);
        assert!(g.remove_keys.is_empty());
        assert_eq!(g.matchers.len(), 1);
    }

    #[test]
    fn test_to_posting_group_regex_set() {
        let index = test_index();
        let g = to_posting_group(&index, &matcher(MatchOp::RegexEqual, "job", "web|api")).unwrap();
        assert_eq!(g.add_keys, vec!["api", "web"]);
    }

    #[test]
    fn test_to_posting_group_regex_scans_values() {
        let index = test_index();
        let g = to_posting_group(&index, &matcher(MatchOp::RegexEqual, "job", "[ad].*")).unwrap();
        assert_eq!(g.add_keys, vec!["api", "db"]);
        assert!(!g.add_all);
    }

    #[test]
    fn test_to_posting_group_not_equal() {
        let index = test_index();
        let g = to_posting_group(&index, &matcher(MatchOp::NotEqual, "job", "api")).unwrap();
        assert!(g.add_all);
        assert_eq!(g.remove_keys, vec!["api"]);
    }

    #[test]
    fn test_to_posting_group_matches_empty() {
        let index = test_index();
        // job=~"a.*|" keeps series without job, removes job values not starting with a
        let g = to_posting_group(&index, &matcher(MatchOp::RegexEqual, "job", "a.*|")).unwrap();
        assert!(g.add_all);
        assert_eq!(g.remove_keys, vec!["db", "web"]);
    }

    #[test]
    fn test_merge_posting_groups() {
        let a = PostingGroup::with_add_keys("job", ["api", "web", "db"]);
        let b = PostingGroup::with_add_keys("job", ["web", "db", "x"]);
        assert_eq!(a.clone().merge(b).add_keys, vec!["db", "web"]);

        let neg = PostingGroup::with_remove_keys("job", ["web"]);
        let merged = neg.clone().merge(a.clone());
        assert!(!merged.add_all);
        assert_eq!(merged.add_keys, vec!["api", "db"]);
        assert!(merged.remove_keys.is_empty());

        let merged = a.merge(neg.clone());
        assert_eq!(merged.add_keys, vec!["api", "db"]);

        let merged = neg.merge(PostingGroup::with_remove_keys("job", ["api"]));
        assert!(merged.add_all);
        assert_eq!(merged.remove_keys, vec!["api", "web"]);
    }

    #[test]
    fn test_matchers_to_posting_groups() {
        let index = test_index();
        let matchers = vec![
            matcher(MatchOp::Equal, "job", "api"),
            matcher(MatchOp::RegexEqual, "env", "prod|dev"),
            matcher(MatchOp::RegexEqual, "job", "api|web"),
            matcher(MatchOp::Equal, "job", "api"),
        ];
        let groups = matchers_to_posting_groups(&index, &matchers).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "env");
        assert_eq!(groups[0].add_keys, vec!["dev", "prod"]);
        assert_eq!(groups[1].name, "job");
        assert_eq!(groups[1].add_keys, vec!["api"]);
        // duplicate matcher is dropped
        assert_eq!(groups[1].matchers.len(), 2);
    }

    #[test]
    fn test_matchers_to_posting_groups_provably_empty() {
        let index = test_index();
        let matchers = vec![
            matcher(MatchOp::Equal, "job", "api"),
            matcher(MatchOp::Equal, "job", "web"),
        ];
        assert!(matchers_to_posting_groups(&index, &matchers).unwrap().is_empty());

        let matchers = vec![matcher(MatchOp::RegexEqual, "job", "zzz.*")];
        assert!(matchers_to_posting_groups(&index, &matchers).unwrap().is_empty());
    }

    #[test]
    fn test_matchers_to_posting_groups_skips_match_all() {
        let index = test_index();
        let matchers = vec![
            matcher(MatchOp::RegexEqual, "job", ".*"),
            matcher(MatchOp::Equal, "env", "dev"),
        ];
        let groups = matchers_to_posting_groups(&index, &matchers).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "env");
    }

    #[test]
    fn test_add_all_postings_group_if_needed() {
        let mut groups = vec![PostingGroup::with_remove_keys("job", ["api"])];
        assert!(add_all_postings_group_if_needed(&mut groups));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], PostingGroup::all_postings());

        let mut groups = vec![PostingGroup::with_add_keys("job", ["api"])];
        assert!(!add_all_postings_group_if_needed(&mut groups));
        assert_eq!(groups.len(), 1);
    }
}
