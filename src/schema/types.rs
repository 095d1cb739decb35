//! Runtime schema registry: entities, fields, relationships. Built once at
//! discovery time, then shared read-only; the engine looks fields up here
//! instead of reflecting on live rows.

use crate::error::SchemaError;
use std::collections::HashMap;

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    /// PostgreSQL type name for SQL casts (e.g. "integer", "timestamptz")
    /// when binding string values.
    pub pg_type: Option<String>,
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
    pub pk_type: Option<PkType>,
}

/// A many-to-many association routed through a junction table.
#[derive(Clone, Debug)]
pub struct JunctionInfo {
    pub schema_name: String,
    pub table_name: String,
    /// Junction column referencing this side.
    pub near_column: String,
    /// Junction column referencing the target side.
    pub far_column: String,
}

/// A named relationship hop from one entity to another. `name` is what
/// request paths traverse (e.g. `author.name` walks the `author` hop).
#[derive(Clone, Debug)]
pub struct RelationshipInfo {
    pub name: String,
    /// Registry key of the related entity.
    pub target: String,
    /// Column on this entity used in the join.
    pub local_column: String,
    /// Column on the target entity used in the join.
    pub remote_column: String,
    pub junction: Option<JunctionInfo>,
}

#[derive(Clone, Debug)]
pub struct EntityInfo {
    pub schema_name: String,
    pub table_name: String,
    pub pk_columns: Vec<String>,
    pub pk_type: PkType,
    pub fields: Vec<FieldInfo>,
    pub relationships: Vec<RelationshipInfo>,
}

impl EntityInfo {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipInfo> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Catalog type of a column, for cast-aware placeholders.
    pub fn pg_type_of(&self, column: &str) -> Option<&str> {
        self.field(column).and_then(|f| f.pg_type.as_deref())
    }
}

/// All discovered entities, keyed by table name.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntityInfo>,
}

impl SchemaRegistry {
    pub fn from_entities(entities: Vec<EntityInfo>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.table_name.clone(), e))
                .collect(),
        }
    }

    pub fn entity(&self, table: &str) -> Result<&EntityInfo, SchemaError> {
        self.entities
            .get(table)
            .ok_or_else(|| SchemaError::UnknownEntity(table.to_string()))
    }

    pub fn get(&self, table: &str) -> Option<&EntityInfo> {
        self.entities.get(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
