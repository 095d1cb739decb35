//! Build the schema registry from the live database catalog.
//!
//! Reads `information_schema` once at startup: columns, primary keys, foreign
//! keys. Each foreign key yields a forward (to-one) hop named after the FK
//! column (trailing `_id` stripped) and a reverse (to-many) hop named after
//! the referencing table. A table whose primary key is exactly its two
//! foreign-key columns is treated as a junction and yields a many-to-many hop
//! on both sides, named after the far table.

use crate::error::SchemaError;
use crate::schema::types::{EntityInfo, FieldInfo, JunctionInfo, PkType, RelationshipInfo, SchemaRegistry};
use sqlx::PgPool;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct FkRow {
    table: String,
    column: String,
    foreign_table: String,
    foreign_column: String,
}

/// Discover all tables of `schema` and assemble the registry.
pub async fn discover(pool: &PgPool, schema: &str) -> Result<SchemaRegistry, SchemaError> {
    let columns: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
        "SELECT table_name, column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema = $1 \
         ORDER BY table_name, ordinal_position",
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| SchemaError::Introspection(e.to_string()))?;

    let pk_rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT tc.table_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON kcu.constraint_name = tc.constraint_name \
          AND kcu.table_schema = tc.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 \
         ORDER BY tc.table_name, kcu.ordinal_position",
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| SchemaError::Introspection(e.to_string()))?;

    let fk_rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT tc.table_name, kcu.column_name, ccu.table_name, ccu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON kcu.constraint_name = tc.constraint_name \
          AND kcu.table_schema = tc.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON ccu.constraint_name = tc.constraint_name \
          AND ccu.table_schema = tc.table_schema \
         WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1",
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|e| SchemaError::Introspection(e.to_string()))?;

    let fks: Vec<FkRow> = fk_rows
        .into_iter()
        .map(|(table, column, foreign_table, foreign_column)| FkRow {
            table,
            column,
            foreign_table,
            foreign_column,
        })
        .collect();

    let registry = assemble(schema, columns, pk_rows, fks)?;
    tracing::info!(schema = %schema, tables = registry.len(), "schema discovered");
    Ok(registry)
}

fn assemble(
    schema: &str,
    columns: Vec<(String, String, String, String, Option<String>)>,
    pk_rows: Vec<(String, String)>,
    fks: Vec<FkRow>,
) -> Result<SchemaRegistry, SchemaError> {
    let mut pk_by_table: HashMap<String, Vec<String>> = HashMap::new();
    for (table, column) in pk_rows {
        pk_by_table.entry(table).or_default().push(column);
    }

    let mut fields_by_table: HashMap<String, Vec<FieldInfo>> = HashMap::new();
    for (table, name, data_type, is_nullable, default) in columns {
        let is_pk = pk_by_table
            .get(&table)
            .map(|pk| pk.contains(&name))
            .unwrap_or(false);
        let pk_type = if is_pk { Some(infer_pk_type(&data_type)) } else { None };
        fields_by_table.entry(table).or_default().push(FieldInfo {
            name,
            pg_type: cast_type_name(&data_type),
            nullable: is_nullable == "YES",
            has_default: default.is_some(),
            pk_type,
        });
    }

    let mut rels_by_table: HashMap<String, Vec<RelationshipInfo>> = HashMap::new();
    let mut fks_by_table: HashMap<String, Vec<&FkRow>> = HashMap::new();
    for fk in &fks {
        fks_by_table.entry(fk.table.clone()).or_default().push(fk);
    }

    // Junction tables: primary key == exactly the two FK columns.
    let mut junctions: Vec<&str> = Vec::new();
    for (table, table_fks) in &fks_by_table {
        if table_fks.len() != 2 {
            continue;
        }
        let Some(pk) = pk_by_table.get(table) else { continue };
        if pk.len() == 2 && table_fks.iter().all(|fk| pk.contains(&fk.column)) {
            junctions.push(table.as_str());
        }
    }

    for fk in &fks {
        if junctions.contains(&fk.table.as_str()) {
            continue;
        }
        // Forward to-one hop, named after the FK column.
        rels_by_table.entry(fk.table.clone()).or_default().push(RelationshipInfo {
            name: hop_name(&fk.column, &fk.foreign_table),
            target: fk.foreign_table.clone(),
            local_column: fk.column.clone(),
            remote_column: fk.foreign_column.clone(),
            junction: None,
        });
        // Reverse to-many hop, named after the referencing table.
        rels_by_table.entry(fk.foreign_table.clone()).or_default().push(RelationshipInfo {
            name: fk.table.clone(),
            target: fk.table.clone(),
            local_column: fk.foreign_column.clone(),
            remote_column: fk.column.clone(),
            junction: None,
        });
    }

    for junction in &junctions {
        let table_fks = &fks_by_table[*junction];
        for (near, far) in [(table_fks[0], table_fks[1]), (table_fks[1], table_fks[0])] {
            rels_by_table.entry(near.foreign_table.clone()).or_default().push(RelationshipInfo {
                name: far.foreign_table.clone(),
                target: far.foreign_table.clone(),
                local_column: near.foreign_column.clone(),
                remote_column: far.foreign_column.clone(),
                junction: Some(JunctionInfo {
                    schema_name: schema.to_string(),
                    table_name: (*junction).to_string(),
                    near_column: near.column.clone(),
                    far_column: far.column.clone(),
                }),
            });
        }
    }

    let mut entities = Vec::new();
    for (table, fields) in fields_by_table {
        let pk_columns = pk_by_table.get(&table).cloned().unwrap_or_default();
        if pk_columns.is_empty() {
            // Views and keyless tables are skipped rather than failing discovery.
            tracing::debug!(table = %table, "skipping table without primary key");
            continue;
        }
        let pk_type = fields
            .iter()
            .find(|f| f.name == pk_columns[0])
            .and_then(|f| f.pk_type.clone())
            .unwrap_or(PkType::Text);
        entities.push(EntityInfo {
            schema_name: schema.to_string(),
            table_name: table.clone(),
            pk_columns,
            pk_type,
            fields,
            relationships: rels_by_table.remove(&table).unwrap_or_default(),
        });
    }

    Ok(SchemaRegistry::from_entities(entities))
}

/// Forward hop name: FK column with trailing `_id` stripped, else the
/// referenced table name.
fn hop_name(fk_column: &str, foreign_table: &str) -> String {
    match fk_column.strip_suffix("_id") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => foreign_table.to_string(),
    }
}

/// Catalog type to use in `$n::type` casts so text request values bind
/// against typed columns. Plain text types need no cast.
fn cast_type_name(data_type: &str) -> Option<String> {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "text" | "character varying" | "character" => None,
        "timestamp with time zone" => Some("timestamptz".into()),
        "timestamp without time zone" => Some("timestamp".into()),
        "double precision" => Some("float8".into()),
        _ => Some(lower),
    }
}

fn infer_pk_type(data_type: &str) -> PkType {
    let lower = data_type.to_lowercase();
    if lower.contains("uuid") {
        PkType::Uuid
    } else if lower.contains("bigint") {
        PkType::BigInt
    } else if lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(
        table: &str,
        name: &str,
        data_type: &str,
        nullable: &str,
        default: Option<&str>,
    ) -> (String, String, String, String, Option<String>) {
        (
            table.into(),
            name.into(),
            data_type.into(),
            nullable.into(),
            default.map(|s| s.to_string()),
        )
    }

    fn fk(table: &str, column: &str, foreign_table: &str, foreign_column: &str) -> FkRow {
        FkRow {
            table: table.into(),
            column: column.into(),
            foreign_table: foreign_table.into(),
            foreign_column: foreign_column.into(),
        }
    }

    #[test]
    fn forward_hop_named_after_fk_column() {
        let registry = assemble(
            "public",
            vec![
                col("users", "id", "bigint", "NO", Some("nextval(...)")),
                col("users", "name", "text", "YES", None),
                col("posts", "id", "bigint", "NO", Some("nextval(...)")),
                col("posts", "author_id", "bigint", "NO", None),
            ],
            vec![
                ("users".into(), "id".into()),
                ("posts".into(), "id".into()),
            ],
            vec![fk("posts", "author_id", "users", "id")],
        )
        .unwrap();

        let posts = registry.entity("posts").unwrap();
        let author = posts.relationship("author").unwrap();
        assert_eq!(author.target, "users");
        assert_eq!(author.local_column, "author_id");
        assert_eq!(author.remote_column, "id");
        assert!(author.junction.is_none());

        let users = registry.entity("users").unwrap();
        let posts_rel = users.relationship("posts").unwrap();
        assert_eq!(posts_rel.target, "posts");
        assert_eq!(posts_rel.local_column, "id");
        assert_eq!(posts_rel.remote_column, "author_id");
    }

    #[test]
    fn junction_table_yields_many_to_many_hops() {
        let registry = assemble(
            "public",
            vec![
                col("posts", "id", "bigint", "NO", None),
                col("tags", "id", "bigint", "NO", None),
                col("post_tags", "post_id", "bigint", "NO", None),
                col("post_tags", "tag_id", "bigint", "NO", None),
            ],
            vec![
                ("posts".into(), "id".into()),
                ("tags".into(), "id".into()),
                ("post_tags".into(), "post_id".into()),
                ("post_tags".into(), "tag_id".into()),
            ],
            vec![
                fk("post_tags", "post_id", "posts", "id"),
                fk("post_tags", "tag_id", "tags", "id"),
            ],
        )
        .unwrap();

        let posts = registry.entity("posts").unwrap();
        let tags = posts.relationship("tags").unwrap();
        assert_eq!(tags.target, "tags");
        let junction = tags.junction.as_ref().unwrap();
        assert_eq!(junction.table_name, "post_tags");
        assert_eq!(junction.near_column, "post_id");
        assert_eq!(junction.far_column, "tag_id");
    }

    #[test]
    fn tables_without_primary_key_are_skipped() {
        let registry = assemble(
            "public",
            vec![
                col("users", "id", "bigint", "NO", None),
                col("audit_view", "line", "text", "YES", None),
            ],
            vec![("users".into(), "id".into())],
            vec![],
        )
        .unwrap();
        assert!(registry.get("audit_view").is_none());
        assert!(registry.get("users").is_some());
    }

    #[test]
    fn pk_type_inferred_from_catalog_type() {
        assert_eq!(infer_pk_type("uuid"), PkType::Uuid);
        assert_eq!(infer_pk_type("bigint"), PkType::BigInt);
        assert_eq!(infer_pk_type("integer"), PkType::Int);
        assert_eq!(infer_pk_type("text"), PkType::Text);
    }
}
