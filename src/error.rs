//! Typed errors. All request-scoped and recoverable; the consuming layer maps
//! them to status codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown entity: '{0}'")]
    UnknownEntity(String),
    #[error("no primary key on table '{0}'")]
    MissingPrimaryKey(String),
    #[error("introspection: {0}")]
    Introspection(String),
}

/// Failure while resolving a dotted field path against the schema registry.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("'{segment}' in '{path}' is not a relationship on '{entity}'")]
    NotARelation {
        entity: String,
        path: String,
        segment: String,
    },
    #[error("unknown field '{segment}' on '{entity}'")]
    UnknownField { entity: String, segment: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid {param} parameter: '{value}'")]
    InvalidPagination { param: &'static str, value: String },
    #[error("unknown operator: '{0}'")]
    OperatorNotFound(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("field not allowed: '{0}'")]
    FieldNotAllowed(String),
    #[error("cannot sort on '{0}': sort fields must be columns of the queried table")]
    InvalidSort(String),
    #[error("'{0}' mixes null and not_null sentinels in one value list")]
    ConflictingNullSentinels(String),
    #[error("invalid id: '{0}'")]
    InvalidId(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("database: {0}")]
    Execution(#[from] sqlx::Error),
}
