//! The parsed, typed form of a request's query parameters.
//!
//! Filter trees are explicit tagged nodes (`Group`/`Leaf`) built by recursive
//! insertion; nothing here mutates shared maps in place. Group maps are
//! ordered so flattening is deterministic.

use serde::Serialize;
use std::collections::BTreeMap;

/// Flat multi-valued request parameters, as decoded from a query string.
#[derive(Clone, Debug, Default)]
pub struct RawParams {
    entries: BTreeMap<String, Vec<String>>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `(key, value)` pairs; repeated keys accumulate values in order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw = Self::new();
        for (k, v) in pairs {
            raw.append(k.into(), v.into());
        }
        raw
    }

    pub fn append(&mut self, key: String, value: String) {
        self.entries.entry(key).or_default().push(value);
    }

    /// First value for a key, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Logical-NULL marker recorded by null-sentinel substitution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NullMarker {
    Null,
    NotNull,
}

/// An OR-membership value list, with its optional logical-NULL marker.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MembershipList {
    pub values: Vec<String>,
    pub marker: Option<NullMarker>,
}

/// Value of a single filter condition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum FilterValue {
    Text(String),
    List(MembershipList),
}

/// Terminal node of a filter tree. `operator: None` means implicit equals;
/// operator names are validated when the predicate is built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterLeaf {
    pub operator: Option<String>,
    pub value: FilterValue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum FilterNode {
    Group(BTreeMap<String, FilterNode>),
    Leaf(FilterLeaf),
}

pub type FilterGroup = BTreeMap<String, FilterNode>;

/// The general nested filter form: an AND tree and an OR tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterSpec {
    pub and_group: FilterGroup,
    pub or_group: FilterGroup,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.and_group.is_empty() && self.or_group.is_empty()
    }
}

/// Insert a leaf at `path`, creating intermediate groups. A leaf already
/// sitting on an intermediate segment is replaced by a group; a duplicate
/// terminal path is overwritten (last key wins).
pub fn insert_leaf(group: &mut FilterGroup, path: &[String], leaf: FilterLeaf) {
    debug_assert!(!path.is_empty());
    if path.len() == 1 {
        group.insert(path[0].clone(), FilterNode::Leaf(leaf));
        return;
    }
    let child = group
        .entry(path[0].clone())
        .or_insert_with(|| FilterNode::Group(BTreeMap::new()));
    if !matches!(child, FilterNode::Group(_)) {
        *child = FilterNode::Group(BTreeMap::new());
    }
    match child {
        FilterNode::Group(map) => insert_leaf(map, &path[1..], leaf),
        FilterNode::Leaf(_) => unreachable!(),
    }
}

/// The simpler, non-nested AND-of-equalities + OR-of-membership form.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HybridGroup {
    pub and_conditions: Vec<(String, String)>,
    pub or_conditions: Vec<(String, MembershipList)>,
}

impl HybridGroup {
    pub fn is_empty(&self) -> bool {
        self.and_conditions.is_empty() && self.or_conditions.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Everything the executor needs for one search call. `hybrid`, when present,
/// supersedes `filter`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StructuredQuery {
    pub filter: Option<FilterSpec>,
    pub hybrid: Option<HybridGroup>,
    pub sort: Vec<SortKey>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}
