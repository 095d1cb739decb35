//! Turn filter trees and hybrid groups into a single WHERE expression plus a
//! deduplicated join plan.
//!
//! An unknown operator or a broken path aborts the whole build; a partially
//! applied filter must never reach the store.

use crate::engine::{EngineOptions, NullSentinelMode};
use crate::error::{EngineError, PathError};
use crate::query::operators::{membership, OperatorRegistry};
use crate::query::relations::{resolve_path, ColumnRef, JoinStep, MAIN_ALIAS};
use crate::query::structured::{
    FilterGroup, FilterNode, FilterSpec, FilterValue, HybridGroup, MembershipList, NullMarker,
};
use crate::schema::{EntityInfo, SchemaRegistry};
use crate::sql::{PgBindValue, SqlBuf};

/// A built filter: boolean expression over aliased columns, and the joins it
/// needs. Bind parameters accumulate in the `SqlBuf` passed through the build.
#[derive(Debug)]
pub struct BuiltFilter {
    pub where_sql: String,
    pub joins: Vec<JoinStep>,
}

impl BuiltFilter {
    pub fn match_all() -> Self {
        Self {
            where_sql: "TRUE".into(),
            joins: Vec::new(),
        }
    }
}

/// One flattened condition out of a filter tree.
#[derive(Debug, PartialEq)]
struct FlatCondition {
    path: Vec<String>,
    operator: Option<String>,
    value: FilterValue,
}

/// Depth-first flatten of a nested group into conditions, deterministic order.
fn flatten(group: &FilterGroup) -> Vec<FlatCondition> {
    fn walk(prefix: &mut Vec<String>, group: &FilterGroup, out: &mut Vec<FlatCondition>) {
        for (segment, node) in group {
            prefix.push(segment.clone());
            match node {
                FilterNode::Leaf(leaf) => out.push(FlatCondition {
                    path: prefix.clone(),
                    operator: leaf.operator.clone(),
                    value: leaf.value.clone(),
                }),
                FilterNode::Group(children) => walk(prefix, children, out),
            }
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    walk(&mut Vec::new(), group, &mut out);
    out
}

pub struct FilterTreeBuilder<'a> {
    pub registry: &'a SchemaRegistry,
    pub operators: &'a OperatorRegistry,
    pub options: &'a EngineOptions,
}

impl<'a> FilterTreeBuilder<'a> {
    /// Build the general nested form: AND-combine the and-group, OR-combine
    /// the or-group, AND the two. Empty groups are vacuous true.
    pub fn build(
        &self,
        entity: &EntityInfo,
        spec: &FilterSpec,
        buf: &mut SqlBuf,
    ) -> Result<BuiltFilter, EngineError> {
        let mut joins = Vec::new();
        let and_preds =
            self.group_predicates(entity, flatten(&spec.and_group), &mut joins, buf)?;
        let or_preds = self.group_predicates(entity, flatten(&spec.or_group), &mut joins, buf)?;
        Ok(BuiltFilter {
            where_sql: conjoin(combine(and_preds, " AND "), combine(or_preds, " OR ")),
            joins,
        })
    }

    fn group_predicates(
        &self,
        entity: &EntityInfo,
        conditions: Vec<FlatCondition>,
        joins: &mut Vec<JoinStep>,
        buf: &mut SqlBuf,
    ) -> Result<Vec<String>, EngineError> {
        let mut preds = Vec::new();
        for cond in conditions {
            if !self.options.check_field(&cond.path[0])? {
                tracing::debug!(field = %cond.path[0], "condition outside allow-list dropped");
                continue;
            }
            let op = self
                .operators
                .resolve(cond.operator.as_deref().unwrap_or("equals"))?;
            let (col, steps) = resolve_path(self.registry, entity, &cond.path)?;
            merge_joins(joins, steps);
            preds.push(op(&col, &cond.value, buf));
        }
        Ok(preds)
    }

    /// Build the hybrid form: AND of equalities, OR of memberships, ANDed
    /// together. Hybrid conditions are single-table; no joins arise.
    pub fn build_hybrid(
        &self,
        entity: &EntityInfo,
        group: &HybridGroup,
        buf: &mut SqlBuf,
    ) -> Result<BuiltFilter, EngineError> {
        let mut and_preds = Vec::new();
        for (field, value) in &group.and_conditions {
            if !self.options.check_field(field)? {
                continue;
            }
            let col = self.column_of(entity, field)?;
            let ph = buf.placeholder(PgBindValue::String(value.clone()), col.pg_type.as_deref());
            and_preds.push(format!("{} = {}", col.sql(), ph));
        }
        let mut or_preds = Vec::new();
        for (field, list) in &group.or_conditions {
            if !self.options.check_field(field)? {
                continue;
            }
            let col = self.column_of(entity, field)?;
            or_preds.push(self.or_membership(&col, list, buf));
        }
        Ok(BuiltFilter {
            where_sql: conjoin(combine(and_preds, " AND "), combine(or_preds, " OR ")),
            joins: Vec::new(),
        })
    }

    fn column_of(&self, entity: &EntityInfo, field: &str) -> Result<ColumnRef, EngineError> {
        let info = entity.field(field).ok_or_else(|| PathError::UnknownField {
            entity: entity.table_name.clone(),
            segment: field.to_string(),
        })?;
        Ok(ColumnRef {
            alias: MAIN_ALIAS.into(),
            column: field.to_string(),
            pg_type: info.pg_type.clone(),
        })
    }

    /// Membership with NULL-marker handling. Under the empty-string
    /// convention a `null` marker matches `''` and NULL, and `not_null`
    /// matches anything but `''`; store-native mode uses plain IS [NOT] NULL.
    fn or_membership(&self, col: &ColumnRef, list: &MembershipList, buf: &mut SqlBuf) -> String {
        let mut parts = Vec::new();
        match (list.marker, self.options.null_sentinel_mode) {
            (Some(NullMarker::Null), NullSentinelMode::EmptyStringConvention) => {
                parts.push(format!("({c} = '' OR {c} IS NULL)", c = col.sql()));
            }
            (Some(NullMarker::Null), NullSentinelMode::StoreNative) => {
                parts.push(format!("{} IS NULL", col.sql()));
            }
            (Some(NullMarker::NotNull), NullSentinelMode::EmptyStringConvention) => {
                parts.push(format!("{} <> ''", col.sql()));
            }
            (Some(NullMarker::NotNull), NullSentinelMode::StoreNative) => {
                parts.push(format!("{} IS NOT NULL", col.sql()));
            }
            (None, _) => {}
        }
        if !list.values.is_empty() || parts.is_empty() {
            parts.push(membership(col, &list.values, buf));
        }
        combine(parts, " OR ").unwrap_or_else(|| "TRUE".into())
    }
}

fn merge_joins(joins: &mut Vec<JoinStep>, steps: Vec<JoinStep>) {
    for step in steps {
        if !joins.iter().any(|j| j.alias == step.alias) {
            joins.push(step);
        }
    }
}

fn combine(preds: Vec<String>, joiner: &str) -> Option<String> {
    match preds.len() {
        0 => None,
        1 => preds.into_iter().next(),
        _ => Some(format!("({})", preds.join(joiner))),
    }
}

/// AND the two combined group results; both empty is vacuous true.
fn conjoin(and_part: Option<String>, or_part: Option<String>) -> String {
    match (and_part, or_part) {
        (None, None) => "TRUE".into(),
        (Some(a), None) => a,
        (None, Some(o)) => o,
        (Some(a), Some(o)) => format!("{} AND {}", a, o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AllowListPolicy;
    use crate::query::structured::{insert_leaf, FilterLeaf};
    use crate::schema::test_fixtures::blog_registry;
    use std::collections::HashSet;

    fn leaf(op: Option<&str>, value: &str) -> FilterLeaf {
        FilterLeaf {
            operator: op.map(|s| s.to_string()),
            value: FilterValue::Text(value.into()),
        }
    }

    fn build(spec: &FilterSpec, options: &EngineOptions) -> Result<(BuiltFilter, SqlBuf), EngineError> {
        let registry = blog_registry();
        let operators = OperatorRegistry::standard();
        let builder = FilterTreeBuilder {
            registry: &registry,
            operators: &operators,
            options,
        };
        let mut buf = SqlBuf::new();
        let entity = registry.entity("posts").unwrap();
        let built = builder.build(entity, spec, &mut buf)?;
        Ok((built, buf))
    }

    #[test]
    fn empty_spec_is_vacuous_true() {
        let (built, buf) = build(&FilterSpec::default(), &EngineOptions::default()).unwrap();
        assert_eq!(built.where_sql, "TRUE");
        assert!(built.joins.is_empty());
        assert!(buf.params.is_empty());
    }

    #[test]
    fn single_equality_condition() {
        let mut spec = FilterSpec::default();
        insert_leaf(&mut spec.and_group, &["status".into()], leaf(None, "active"));
        let (built, buf) = build(&spec, &EngineOptions::default()).unwrap();
        assert_eq!(built.where_sql, "\"main\".\"status\" = $1");
        assert_eq!(buf.params, vec![PgBindValue::String("active".into())]);
    }

    #[test]
    fn and_and_or_groups_conjoin() {
        let mut spec = FilterSpec::default();
        insert_leaf(&mut spec.and_group, &["status".into()], leaf(None, "active"));
        insert_leaf(&mut spec.or_group, &["title".into()], leaf(Some("like"), "%a%"));
        insert_leaf(&mut spec.or_group, &["age".into()], leaf(Some("gt"), "3"));
        let (built, _) = build(&spec, &EngineOptions::default()).unwrap();
        assert_eq!(
            built.where_sql,
            "\"main\".\"status\" = $1 AND \
             (\"main\".\"age\" > $2::integer OR \"main\".\"title\" LIKE $3)"
        );
    }

    #[test]
    fn unknown_operator_aborts_build() {
        let mut spec = FilterSpec::default();
        insert_leaf(&mut spec.and_group, &["status".into()], leaf(None, "active"));
        insert_leaf(&mut spec.and_group, &["age".into()], leaf(Some("bogus"), "5"));
        let err = build(&spec, &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::OperatorNotFound(name) if name == "bogus"));
    }

    #[test]
    fn relation_path_adds_join_once() {
        let mut spec = FilterSpec::default();
        insert_leaf(
            &mut spec.and_group,
            &["author".into(), "name".into()],
            leaf(Some("like"), "%Doe%"),
        );
        insert_leaf(
            &mut spec.and_group,
            &["author".into(), "email".into()],
            leaf(None, "x@y.z"),
        );
        let (built, _) = build(&spec, &EngineOptions::default()).unwrap();
        assert_eq!(built.joins.len(), 1);
        assert_eq!(built.joins[0].alias, "author");
        assert!(built.where_sql.contains("\"author\".\"name\" LIKE"));
    }

    #[test]
    fn broken_path_aborts_build() {
        let mut spec = FilterSpec::default();
        insert_leaf(
            &mut spec.and_group,
            &["title".into(), "name".into()],
            leaf(None, "x"),
        );
        let err = build(&spec, &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Path(PathError::NotARelation { .. })));
    }

    #[test]
    fn allow_list_drop_excludes_condition() {
        let options = EngineOptions {
            allowed_fields: Some(HashSet::from(["status".to_string()])),
            ..EngineOptions::default()
        };
        let mut spec = FilterSpec::default();
        insert_leaf(&mut spec.and_group, &["status".into()], leaf(None, "active"));
        insert_leaf(&mut spec.and_group, &["title".into()], leaf(None, "x"));
        let (built, _) = build(&spec, &options).unwrap();
        assert_eq!(built.where_sql, "\"main\".\"status\" = $1");
    }

    #[test]
    fn allow_list_reject_fails_request() {
        let options = EngineOptions {
            allowed_fields: Some(HashSet::from(["status".to_string()])),
            allow_list_policy: AllowListPolicy::Reject,
            ..EngineOptions::default()
        };
        let mut spec = FilterSpec::default();
        insert_leaf(&mut spec.and_group, &["title".into()], leaf(None, "x"));
        let err = build(&spec, &options).unwrap_err();
        assert!(matches!(err, EngineError::FieldNotAllowed(f) if f == "title"));
    }

    fn build_hybrid(
        group: &HybridGroup,
        options: &EngineOptions,
    ) -> Result<(BuiltFilter, SqlBuf), EngineError> {
        let registry = blog_registry();
        let operators = OperatorRegistry::standard();
        let builder = FilterTreeBuilder {
            registry: &registry,
            operators: &operators,
            options,
        };
        let mut buf = SqlBuf::new();
        let entity = registry.entity("posts").unwrap();
        let built = builder.build_hybrid(entity, group, &mut buf)?;
        Ok((built, buf))
    }

    #[test]
    fn hybrid_membership_without_marker() {
        let group = HybridGroup {
            and_conditions: vec![],
            or_conditions: vec![(
                "status".into(),
                MembershipList {
                    values: vec!["active".into(), "inactive".into()],
                    marker: None,
                },
            )],
        };
        let (built, buf) = build_hybrid(&group, &EngineOptions::default()).unwrap();
        assert_eq!(built.where_sql, "\"main\".\"status\" IN ($1, $2)");
        assert_eq!(buf.params.len(), 2);
    }

    #[test]
    fn hybrid_null_marker_couples_empty_string_and_null() {
        let group = HybridGroup {
            and_conditions: vec![],
            or_conditions: vec![(
                "status".into(),
                MembershipList {
                    values: vec!["active".into()],
                    marker: Some(NullMarker::Null),
                },
            )],
        };
        let (built, _) = build_hybrid(&group, &EngineOptions::default()).unwrap();
        assert_eq!(
            built.where_sql,
            "((\"main\".\"status\" = '' OR \"main\".\"status\" IS NULL) \
             OR \"main\".\"status\" IN ($1))"
        );
    }

    #[test]
    fn hybrid_null_marker_store_native_mode() {
        let options = EngineOptions {
            null_sentinel_mode: NullSentinelMode::StoreNative,
            ..EngineOptions::default()
        };
        let group = HybridGroup {
            and_conditions: vec![],
            or_conditions: vec![(
                "status".into(),
                MembershipList {
                    values: vec![],
                    marker: Some(NullMarker::Null),
                },
            )],
        };
        let (built, _) = build_hybrid(&group, &options).unwrap();
        assert_eq!(built.where_sql, "\"main\".\"status\" IS NULL");
    }

    #[test]
    fn hybrid_not_null_marker() {
        let group = HybridGroup {
            and_conditions: vec![],
            or_conditions: vec![(
                "status".into(),
                MembershipList {
                    values: vec![],
                    marker: Some(NullMarker::NotNull),
                },
            )],
        };
        let (built, _) = build_hybrid(&group, &EngineOptions::default()).unwrap();
        assert_eq!(built.where_sql, "\"main\".\"status\" <> ''");
    }

    #[test]
    fn hybrid_and_conditions_conjoin_with_or_block() {
        let group = HybridGroup {
            and_conditions: vec![("title".into(), "hello".into())],
            or_conditions: vec![(
                "status".into(),
                MembershipList {
                    values: vec!["a".into()],
                    marker: None,
                },
            )],
        };
        let (built, _) = build_hybrid(&group, &EngineOptions::default()).unwrap();
        assert_eq!(
            built.where_sql,
            "\"main\".\"title\" = $1 AND \"main\".\"status\" IN ($2)"
        );
    }

    #[test]
    fn empty_hybrid_is_vacuous_true() {
        let (built, _) = build_hybrid(&HybridGroup::default(), &EngineOptions::default()).unwrap();
        assert_eq!(built.where_sql, "TRUE");
    }

    #[test]
    fn hybrid_unknown_field_fails() {
        let group = HybridGroup {
            and_conditions: vec![("shoe_size".into(), "9".into())],
            or_conditions: vec![],
        };
        let err = build_hybrid(&group, &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Path(PathError::UnknownField { .. })));
    }
}
