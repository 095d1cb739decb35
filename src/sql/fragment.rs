//! Statement accumulation: SQL text plus ordered bind parameters.

use crate::sql::bind::PgBindValue;

/// Quote identifier for PostgreSQL (safe: only registry-owned names reach here).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Qualified column reference, e.g. `"main"."status"`.
pub fn column_ref(alias: &str, column: &str) -> String {
    format!("{}.{}", quoted(alias), quoted(column))
}

/// Accumulates bind parameters and hands out `$n` placeholders in order.
/// Shared by the filter builder and the executor so both the count and the
/// page statement see one consistent numbering.
#[derive(Debug, Default)]
pub struct SqlBuf {
    pub params: Vec<PgBindValue>,
}

impl SqlBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value; returns its `$n` placeholder, cast to `pg_type` when the
    /// column's catalog type is known so text request values bind correctly.
    pub fn placeholder(&mut self, value: PgBindValue, pg_type: Option<&str>) -> String {
        self.params.push(value);
        let n = self.params.len();
        match pg_type {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}
