//! Execute a structured query: filtered count plus one page of rows.
//!
//! Fixed order per call: build the predicate (hybrid supersedes filter),
//! apply joins, apply sort, count the unpaginated set, then page with
//! OFFSET/LIMIT. Statement assembly is pure; execution holds one pooled
//! connection for the duration of the call.

use crate::engine::EngineOptions;
use crate::error::{EngineError, PathError};
use crate::query::builder::{BuiltFilter, FilterTreeBuilder};
use crate::query::operators::OperatorRegistry;
use crate::query::relations::MAIN_ALIAS;
use crate::query::structured::StructuredQuery;
use crate::schema::{EntityInfo, SchemaRegistry};
use crate::sql::{column_ref, qualified_table, quoted, row_to_json, select_column_list, SqlBuf, Statement};
use sqlx::PgPool;

#[derive(Debug)]
pub struct SearchResult {
    /// Size of the filtered set, independent of pagination.
    pub count: i64,
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct SearchStatements {
    pub count: Statement,
    pub page: Statement,
}

/// Assemble the count and page statements for one search. Both share one
/// parameter list; LIMIT/OFFSET are validated integers rendered inline.
pub fn build_search_statements(
    registry: &SchemaRegistry,
    operators: &OperatorRegistry,
    options: &EngineOptions,
    entity: &EntityInfo,
    query: &StructuredQuery,
) -> Result<SearchStatements, EngineError> {
    let mut buf = SqlBuf::new();
    let builder = FilterTreeBuilder {
        registry,
        operators,
        options,
    };
    let built = if let Some(hybrid) = &query.hybrid {
        builder.build_hybrid(entity, hybrid, &mut buf)?
    } else if let Some(filter) = &query.filter {
        builder.build(entity, filter, &mut buf)?
    } else {
        BuiltFilter::match_all()
    };

    let mut from = format!(
        "{} AS {}",
        qualified_table(&entity.schema_name, &entity.table_name),
        quoted(MAIN_ALIAS)
    );
    for join in &built.joins {
        from.push_str(&join.sql());
    }

    // Sort is single-level: a column of the queried table, never a hop.
    let mut order = Vec::new();
    for key in &query.sort {
        if key.field.contains('.') || key.field.contains("__") {
            return Err(EngineError::InvalidSort(key.field.clone()));
        }
        if entity.field(&key.field).is_none() {
            return Err(PathError::UnknownField {
                entity: entity.table_name.clone(),
                segment: key.field.clone(),
            }
            .into());
        }
        order.push(format!(
            "{} {}",
            column_ref(MAIN_ALIAS, &key.field),
            key.direction.sql()
        ));
    }
    // Primary-key tiebreaker keeps repeated searches identically ordered.
    let pk = &entity.pk_columns[0];
    if !query.sort.iter().any(|k| k.field == *pk) {
        order.push(format!("{} ASC", column_ref(MAIN_ALIAS, pk)));
    }

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", from, built.where_sql);
    let mut page_sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        select_column_list(entity, Some(MAIN_ALIAS)),
        from,
        built.where_sql,
        order.join(", ")
    );
    if let Some(limit) = query.limit {
        page_sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = query.offset {
        page_sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(SearchStatements {
        count: Statement {
            sql: count_sql,
            params: buf.params.clone(),
        },
        page: Statement {
            sql: page_sql,
            params: buf.params,
        },
    })
}

/// Run one search on a scoped connection: count first, then the page.
pub async fn search_structured(
    pool: &PgPool,
    registry: &SchemaRegistry,
    operators: &OperatorRegistry,
    options: &EngineOptions,
    entity: &EntityInfo,
    query: &StructuredQuery,
) -> Result<SearchResult, EngineError> {
    let statements = build_search_statements(registry, operators, options, entity, query)?;

    // One connection for both statements; released on every exit path.
    let mut conn = pool.acquire().await?;

    tracing::debug!(sql = %statements.count.sql, params = ?statements.count.params, "count query");
    let mut count_query = sqlx::query_scalar::<_, i64>(&statements.count.sql);
    for param in &statements.count.params {
        count_query = count_query.bind(param.clone());
    }
    let count = count_query.fetch_one(&mut *conn).await?;

    tracing::debug!(sql = %statements.page.sql, params = ?statements.page.params, "page query");
    let mut page_query = sqlx::query(&statements.page.sql);
    for param in &statements.page.params {
        page_query = page_query.bind(param.clone());
    }
    let rows = page_query.fetch_all(&mut *conn).await?;

    Ok(SearchResult {
        count,
        rows: rows.iter().map(row_to_json).collect(),
    })
}
