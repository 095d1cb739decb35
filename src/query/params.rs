//! Parse flat multi-valued request parameters into a `StructuredQuery`.
//!
//! Key grammar: `page`, `limit`, `offset`, `sort` are reserved. In a generic
//! key, `.` separates relationship hops and a trailing `__`-segment names the
//! operator (`author.name__like=%Doe%`); keys without `__` are implicit
//! equals. An `or__` prefix routes the condition to the OR bucket; a bare
//! `or__<field>` with a comma-separated value becomes an OR-membership list.

use crate::engine::{EngineOptions, NullSentinelMode};
use crate::error::EngineError;
use crate::query::structured::{
    insert_leaf, FilterLeaf, FilterSpec, FilterValue, HybridGroup, MembershipList, NullMarker,
    RawParams, SortDirection, SortKey, StructuredQuery,
};
use regex::Regex;

const OR_PREFIX: &str = "or__";
const NULL_SENTINEL: &str = "null";
const NOT_NULL_SENTINEL: &str = "not_null";

pub struct ParameterParser {
    default_page_size: i64,
    null_mode: NullSentinelMode,
    sort_re: Regex,
}

impl ParameterParser {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            default_page_size: options.default_page_size,
            null_mode: options.null_sentinel_mode,
            // Sort values are advisory; anything not matching is dropped.
            sort_re: Regex::new(r"^(?P<field>.+)__(?P<dir>asc|desc)$").expect("sort grammar"),
        }
    }

    pub fn parse(&self, raw: &RawParams) -> Result<StructuredQuery, EngineError> {
        let mut query = StructuredQuery::default();
        let mut filter = FilterSpec::default();
        let mut hybrid = HybridGroup::default();

        self.parse_pagination(raw, &mut query)?;

        if let Some(value) = raw.first("sort") {
            if let Some(caps) = self.sort_re.captures(value) {
                let direction = match &caps["dir"] {
                    "asc" => SortDirection::Asc,
                    _ => SortDirection::Desc,
                };
                query.sort.push(SortKey {
                    field: caps["field"].to_string(),
                    direction,
                });
            }
        }

        for (key, values) in raw.iter() {
            if matches!(key, "page" | "limit" | "offset" | "sort") {
                continue;
            }
            let Some(first) = values.first() else { continue };

            if let Some(rest) = key.strip_prefix(OR_PREFIX) {
                if is_bare_field(rest) {
                    let list = self.membership_list(rest, first)?;
                    hybrid.or_conditions.push((rest.to_string(), list));
                } else {
                    let (path, operator) = split_key(rest);
                    insert_leaf(
                        &mut filter.or_group,
                        &path,
                        FilterLeaf {
                            operator,
                            value: FilterValue::Text(first.clone()),
                        },
                    );
                }
            } else {
                let (path, operator) = split_key(key);
                let mut value = first.clone();
                // AND-bucket scalar sentinel rewrite (empty-string convention).
                if self.null_mode == NullSentinelMode::EmptyStringConvention
                    && value == NULL_SENTINEL
                {
                    value = String::new();
                }
                insert_leaf(
                    &mut filter.and_group,
                    &path,
                    FilterLeaf {
                        operator,
                        value: FilterValue::Text(value),
                    },
                );
            }
        }

        if !filter.is_empty() {
            query.filter = Some(filter);
        }
        if !hybrid.is_empty() {
            query.hybrid = Some(hybrid);
        }
        Ok(query)
    }

    fn parse_pagination(
        &self,
        raw: &RawParams,
        query: &mut StructuredQuery,
    ) -> Result<(), EngineError> {
        if let Some(page) = raw.first("page") {
            let page = parse_count("page", page)?;
            if page < 1 {
                return Err(EngineError::InvalidPagination {
                    param: "page",
                    value: page.to_string(),
                });
            }
            let limit = match raw.first("limit") {
                Some(l) => parse_count("limit", l)?,
                None => self.default_page_size,
            };
            query.limit = Some(limit);
            query.offset = Some((page - 1) * limit);
        } else {
            if let Some(l) = raw.first("limit") {
                query.limit = Some(parse_count("limit", l)?);
            }
            if let Some(o) = raw.first("offset") {
                query.offset = Some(parse_count("offset", o)?);
            }
        }
        Ok(())
    }

    /// Comma-split an OR-membership value, recording null sentinels.
    /// Every sentinel occurrence is consumed; mixing both kinds in one list
    /// is rejected rather than guessed at.
    fn membership_list(&self, field: &str, value: &str) -> Result<MembershipList, EngineError> {
        let mut list = MembershipList::default();
        for token in value.split(',') {
            let marker = match token {
                NULL_SENTINEL => Some(NullMarker::Null),
                NOT_NULL_SENTINEL => Some(NullMarker::NotNull),
                _ => None,
            };
            match marker {
                Some(m) => match list.marker {
                    Some(existing) if existing != m => {
                        return Err(EngineError::ConflictingNullSentinels(field.to_string()));
                    }
                    _ => list.marker = Some(m),
                },
                None => list.values.push(token.to_string()),
            }
        }
        Ok(list)
    }
}

/// A key with neither an operator segment nor a relationship hop.
fn is_bare_field(key: &str) -> bool {
    !key.contains("__") && !key.contains('.')
}

/// Decompose a generic key: `__` splits off nesting segments with the
/// operator in terminal position, `.` splits hops within a segment.
/// `author.name__like` → (["author", "name"], Some("like")); `status` →
/// (["status"], None).
fn split_key(key: &str) -> (Vec<String>, Option<String>) {
    let mut segments: Vec<&str> = key.split("__").collect();
    let operator = if segments.len() > 1 {
        segments.pop().map(|s| s.to_string())
    } else {
        None
    };
    let path = segments
        .iter()
        .flat_map(|s| s.split('.'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    (path, operator)
}

fn parse_count(param: &'static str, value: &str) -> Result<i64, EngineError> {
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(EngineError::InvalidPagination {
            param,
            value: value.to_string(),
        }),
    }
}
