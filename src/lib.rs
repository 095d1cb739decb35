//! Dynamic query-filter engine and generic CRUD over runtime-discovered
//! PostgreSQL tables.
//!
//! Table structure is introspected once into a [`schema::SchemaRegistry`];
//! flat request parameters are parsed into a [`query::StructuredQuery`],
//! built into a predicate with joins, and executed as a filtered count plus
//! one page of rows. See [`engine::QueryEngine`] for the entry point.

pub mod engine;
pub mod error;
pub mod query;
pub mod schema;
pub mod service;
pub mod sql;

pub use engine::{AllowListPolicy, EngineOptions, NullSentinelMode, QueryEngine};
pub use error::{EngineError, PathError, SchemaError};
pub use query::{
    OperatorKind, OperatorRegistry, ParameterParser, RawParams, SearchResult, StructuredQuery,
};
pub use schema::{discover, EntityInfo, SchemaRegistry};
pub use service::CrudService;
