//! Shared in-memory registry for unit tests: a small blog schema with a
//! to-one hop (posts.author), to-many hops, and a junction (post_tags).

use crate::schema::types::{
    EntityInfo, FieldInfo, JunctionInfo, PkType, RelationshipInfo, SchemaRegistry,
};

fn field(name: &str, pg_type: Option<&str>) -> FieldInfo {
    FieldInfo {
        name: name.into(),
        pg_type: pg_type.map(|s| s.to_string()),
        nullable: true,
        has_default: false,
        pk_type: None,
    }
}

fn pk_field(name: &str, pg_type: &str, pk_type: PkType) -> FieldInfo {
    FieldInfo {
        name: name.into(),
        pg_type: Some(pg_type.into()),
        nullable: false,
        has_default: true,
        pk_type: Some(pk_type),
    }
}

fn rel(name: &str, target: &str, local: &str, remote: &str) -> RelationshipInfo {
    RelationshipInfo {
        name: name.into(),
        target: target.into(),
        local_column: local.into(),
        remote_column: remote.into(),
        junction: None,
    }
}

pub fn blog_registry() -> SchemaRegistry {
    let users = EntityInfo {
        schema_name: "public".into(),
        table_name: "users".into(),
        pk_columns: vec!["id".into()],
        pk_type: PkType::BigInt,
        fields: vec![
            pk_field("id", "bigint", PkType::BigInt),
            field("name", None),
            field("email", None),
        ],
        relationships: vec![rel("posts", "posts", "id", "author_id")],
    };

    let posts = EntityInfo {
        schema_name: "public".into(),
        table_name: "posts".into(),
        pk_columns: vec!["id".into()],
        pk_type: PkType::BigInt,
        fields: vec![
            pk_field("id", "bigint", PkType::BigInt),
            field("title", None),
            field("status", None),
            field("age", Some("integer")),
            field("created_at", Some("timestamptz")),
            field("author_id", Some("bigint")),
        ],
        relationships: vec![
            rel("author", "users", "author_id", "id"),
            rel("comments", "comments", "id", "post_id"),
            RelationshipInfo {
                name: "tags".into(),
                target: "tags".into(),
                local_column: "id".into(),
                remote_column: "id".into(),
                junction: Some(JunctionInfo {
                    schema_name: "public".into(),
                    table_name: "post_tags".into(),
                    near_column: "post_id".into(),
                    far_column: "tag_id".into(),
                }),
            },
        ],
    };

    let comments = EntityInfo {
        schema_name: "public".into(),
        table_name: "comments".into(),
        pk_columns: vec!["id".into()],
        pk_type: PkType::BigInt,
        fields: vec![
            pk_field("id", "bigint", PkType::BigInt),
            field("post_id", Some("bigint")),
            field("body", None),
        ],
        relationships: vec![rel("post", "posts", "post_id", "id")],
    };

    let tags = EntityInfo {
        schema_name: "public".into(),
        table_name: "tags".into(),
        pk_columns: vec!["id".into()],
        pk_type: PkType::BigInt,
        fields: vec![pk_field("id", "bigint", PkType::BigInt), field("label", None)],
        relationships: vec![],
    };

    SchemaRegistry::from_entities(vec![users, posts, comments, tags])
}
