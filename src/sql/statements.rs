//! Parameterized INSERT, SELECT-by-pk, UPDATE-by-pk, DELETE-by-pk.
//!
//! These are the forwarding operations: no filter engine involvement, just
//! primary-key statements assembled from the registry.

use crate::schema::EntityInfo;
use crate::sql::bind::PgBindValue;
use crate::sql::fragment::{column_ref, qualified_table, quoted, SqlBuf};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

/// SELECT list: each column as-is, except numeric as `col::text` so sqlx
/// returns String.
pub fn select_column_list(entity: &EntityInfo, alias: Option<&str>) -> String {
    entity
        .fields
        .iter()
        .map(|f| {
            let col = match alias {
                Some(a) => column_ref(a, &f.name),
                None => quoted(&f.name),
            };
            if f.pg_type.as_deref() == Some("numeric") {
                format!("{}::text AS {}", col, quoted(&f.name))
            } else {
                col
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn table_of(entity: &EntityInfo) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

/// SELECT by primary key (single-column pk only).
pub fn select_by_id(entity: &EntityInfo, id: PgBindValue) -> Statement {
    let mut buf = SqlBuf::new();
    let pk = &entity.pk_columns[0];
    let ph = buf.placeholder(id, entity.pg_type_of(pk));
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = {}",
            select_column_list(entity, None),
            table_of(entity),
            quoted(pk),
            ph
        ),
        params: buf.params,
    }
}

/// INSERT from a JSON object body. Unknown keys are ignored; columns with a
/// DB default are omitted when the body does not provide a value.
pub fn insert(entity: &EntityInfo, body: &HashMap<String, Value>) -> Statement {
    let mut buf = SqlBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &entity.fields {
        let val = body.get(&f.name);
        if val.is_none() && (f.has_default || f.pk_type.is_some()) {
            continue;
        }
        let val = val.cloned().unwrap_or(Value::Null);
        let ph = buf.placeholder(PgBindValue::from_json(&val), f.pg_type.as_deref());
        cols.push(quoted(&f.name));
        placeholders.push(ph);
    }
    let sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            table_of(entity),
            select_column_list(entity, None)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table_of(entity),
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(entity, None)
        )
    };
    Statement {
        sql,
        params: buf.params,
    }
}

/// UPDATE by pk: SET only body keys that are known non-pk columns. Falls back
/// to a plain SELECT when the body carries nothing updatable.
pub fn update(entity: &EntityInfo, id: PgBindValue, body: &HashMap<String, Value>) -> Statement {
    let mut buf = SqlBuf::new();
    let pk = &entity.pk_columns[0];
    let mut sets = Vec::new();
    for f in &entity.fields {
        if entity.pk_columns.contains(&f.name) {
            continue;
        }
        let Some(v) = body.get(&f.name) else { continue };
        let ph = buf.placeholder(PgBindValue::from_json(v), f.pg_type.as_deref());
        sets.push(format!("{} = {}", quoted(&f.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_ph = buf.placeholder(id, entity.pg_type_of(pk));
    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            table_of(entity),
            sets.join(", "),
            quoted(pk),
            id_ph,
            select_column_list(entity, None)
        ),
        params: buf.params,
    }
}

/// DELETE by pk, returning the deleted row.
pub fn delete(entity: &EntityInfo, id: PgBindValue) -> Statement {
    let mut buf = SqlBuf::new();
    let pk = &entity.pk_columns[0];
    let ph = buf.placeholder(id, entity.pg_type_of(pk));
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = {} RETURNING {}",
            table_of(entity),
            quoted(pk),
            ph,
            select_column_list(entity, None)
        ),
        params: buf.params,
    }
}
