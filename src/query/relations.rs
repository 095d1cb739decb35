//! Resolve dotted field paths to a column reference plus the joins needed to
//! reach it.
//!
//! Every non-terminal segment must name a relationship on the current entity;
//! anything else fails loudly rather than truncating the walk. A
//! junction-backed hop emits a join for the junction and one for the related
//! table. Join aliases derive from the path prefix so the same hop resolves
//! to the same alias from every condition, which makes the join plan
//! deduplicate cleanly.

use crate::error::{EngineError, PathError};
use crate::schema::{EntityInfo, SchemaRegistry};
use crate::sql::{column_ref, qualified_table, quoted};

/// Alias of the queried (root) table in every statement.
pub const MAIN_ALIAS: &str = "main";

/// A fully resolved column: alias-qualified, with its catalog type for casts.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
    pub pg_type: Option<String>,
}

impl ColumnRef {
    pub fn sql(&self) -> String {
        column_ref(&self.alias, &self.column)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinStep {
    pub table: String,
    pub alias: String,
    pub on_sql: String,
}

impl JoinStep {
    pub fn sql(&self) -> String {
        format!(" JOIN {} AS {} ON {}", self.table, quoted(&self.alias), self.on_sql)
    }
}

/// Walk `path` from `entity`, returning the terminal column and the ordered
/// join steps the walk requires.
pub fn resolve_path(
    registry: &SchemaRegistry,
    entity: &EntityInfo,
    path: &[String],
) -> Result<(ColumnRef, Vec<JoinStep>), EngineError> {
    let mut current = entity;
    let mut alias = MAIN_ALIAS.to_string();
    let mut prefix = String::new();
    let mut joins = Vec::new();

    for (i, segment) in path.iter().enumerate() {
        if i == path.len() - 1 {
            let field = current.field(segment).ok_or_else(|| PathError::UnknownField {
                entity: current.table_name.clone(),
                segment: segment.clone(),
            })?;
            return Ok((
                ColumnRef {
                    alias,
                    column: segment.clone(),
                    pg_type: field.pg_type.clone(),
                },
                joins,
            ));
        }

        let rel = current
            .relationship(segment)
            .ok_or_else(|| PathError::NotARelation {
                entity: current.table_name.clone(),
                path: path.join("."),
                segment: segment.clone(),
            })?;
        let target = registry.entity(&rel.target)?;
        let next_alias = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{}_{}", prefix, segment)
        };

        if let Some(junction) = &rel.junction {
            let link_alias = format!("{}_link", next_alias);
            joins.push(JoinStep {
                table: qualified_table(&junction.schema_name, &junction.table_name),
                alias: link_alias.clone(),
                on_sql: format!(
                    "{} = {}",
                    column_ref(&link_alias, &junction.near_column),
                    column_ref(&alias, &rel.local_column)
                ),
            });
            joins.push(JoinStep {
                table: qualified_table(&target.schema_name, &target.table_name),
                alias: next_alias.clone(),
                on_sql: format!(
                    "{} = {}",
                    column_ref(&next_alias, &rel.remote_column),
                    column_ref(&link_alias, &junction.far_column)
                ),
            });
        } else {
            joins.push(JoinStep {
                table: qualified_table(&target.schema_name, &target.table_name),
                alias: next_alias.clone(),
                on_sql: format!(
                    "{} = {}",
                    column_ref(&next_alias, &rel.remote_column),
                    column_ref(&alias, &rel.local_column)
                ),
            });
        }

        current = target;
        prefix = next_alias.clone();
        alias = next_alias;
    }

    // Parser never emits an empty path.
    Err(PathError::UnknownField {
        entity: entity.table_name.clone(),
        segment: String::new(),
    }
    .into())
}
