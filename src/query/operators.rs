//! Named comparison operators and their predicate constructors.
//!
//! The registry is built once at startup and shared read-only. Resolving an
//! unknown name is a request-validation error; a condition is never silently
//! dropped on the floor.

use crate::error::EngineError;
use crate::query::relations::ColumnRef;
use crate::query::structured::FilterValue;
use crate::sql::{PgBindValue, SqlBuf};
use std::collections::HashMap;

/// Builds one SQL boolean expression for a resolved column and a value,
/// binding parameters through the shared buffer.
pub type OperatorFn = fn(&ColumnRef, &FilterValue, &mut SqlBuf) -> String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Like,
    Equals,
    IsNull,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    NotEqualTo,
}

impl OperatorKind {
    pub fn name(self) -> &'static str {
        match self {
            OperatorKind::Like => "like",
            OperatorKind::Equals => "equals",
            OperatorKind::IsNull => "is_null",
            OperatorKind::Gt => "gt",
            OperatorKind::Gte => "gte",
            OperatorKind::Lt => "lt",
            OperatorKind::Lte => "lte",
            OperatorKind::In => "in",
            OperatorKind::NotIn => "not_in",
            OperatorKind::NotEqualTo => "not_equal_to",
        }
    }
}

pub struct OperatorRegistry {
    ops: HashMap<&'static str, (OperatorKind, OperatorFn)>,
}

impl OperatorRegistry {
    /// The fixed operator table.
    pub fn standard() -> Self {
        let mut ops: HashMap<&'static str, (OperatorKind, OperatorFn)> = HashMap::new();
        ops.insert("like", (OperatorKind::Like, op_like as OperatorFn));
        ops.insert("equals", (OperatorKind::Equals, op_equals));
        ops.insert("is_null", (OperatorKind::IsNull, op_is_null));
        ops.insert("gt", (OperatorKind::Gt, op_gt));
        ops.insert("gte", (OperatorKind::Gte, op_gte));
        ops.insert("lt", (OperatorKind::Lt, op_lt));
        ops.insert("lte", (OperatorKind::Lte, op_lte));
        ops.insert("in", (OperatorKind::In, op_in));
        ops.insert("not_in", (OperatorKind::NotIn, op_not_in));
        ops.insert("not_equal_to", (OperatorKind::NotEqualTo, op_not_equal_to));
        Self { ops }
    }

    pub fn resolve(&self, name: &str) -> Result<OperatorFn, EngineError> {
        self.ops
            .get(name)
            .map(|(_, f)| *f)
            .ok_or_else(|| EngineError::OperatorNotFound(name.to_string()))
    }

    pub fn kind(&self, name: &str) -> Result<OperatorKind, EngineError> {
        self.ops
            .get(name)
            .map(|(k, _)| *k)
            .ok_or_else(|| EngineError::OperatorNotFound(name.to_string()))
    }
}

/// Single text value of a condition; a list falls back to its first element.
fn scalar_of(value: &FilterValue) -> &str {
    match value {
        FilterValue::Text(s) => s.as_str(),
        FilterValue::List(list) => list.values.first().map(|s| s.as_str()).unwrap_or(""),
    }
}

/// Value list of a condition; a scalar is comma-split.
fn list_of(value: &FilterValue) -> Vec<String> {
    match value {
        FilterValue::Text(s) => s.split(',').map(|t| t.to_string()).collect(),
        FilterValue::List(list) => list.values.clone(),
    }
}

fn comparison(op: &str, col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    let ph = buf.placeholder(
        PgBindValue::String(scalar_of(value).to_string()),
        col.pg_type.as_deref(),
    );
    format!("{} {} {}", col.sql(), op, ph)
}

fn op_like(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    // LIKE is text-typed on both sides; no cast on the parameter.
    let ph = buf.placeholder(PgBindValue::String(scalar_of(value).to_string()), None);
    format!("{} LIKE {}", col.sql(), ph)
}

fn op_equals(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison("=", col, value, buf)
}

/// Value literal "True" selects IS NULL, anything else IS NOT NULL.
fn op_is_null(col: &ColumnRef, value: &FilterValue, _buf: &mut SqlBuf) -> String {
    if scalar_of(value) == "True" {
        format!("{} IS NULL", col.sql())
    } else {
        format!("{} IS NOT NULL", col.sql())
    }
}

fn op_gt(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison(">", col, value, buf)
}

fn op_gte(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison(">=", col, value, buf)
}

fn op_lt(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison("<", col, value, buf)
}

fn op_lte(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison("<=", col, value, buf)
}

pub(crate) fn membership(col: &ColumnRef, values: &[String], buf: &mut SqlBuf) -> String {
    if values.is_empty() {
        return "FALSE".into();
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| buf.placeholder(PgBindValue::String(v.clone()), col.pg_type.as_deref()))
        .collect();
    format!("{} IN ({})", col.sql(), placeholders.join(", "))
}

fn op_in(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    membership(col, &list_of(value), buf)
}

fn op_not_in(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    let values = list_of(value);
    if values.is_empty() {
        return "TRUE".into();
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| buf.placeholder(PgBindValue::String(v.clone()), col.pg_type.as_deref()))
        .collect();
    format!("{} NOT IN ({})", col.sql(), placeholders.join(", "))
}

fn op_not_equal_to(col: &ColumnRef, value: &FilterValue, buf: &mut SqlBuf) -> String {
    comparison("<>", col, value, buf)
}
