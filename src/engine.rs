//! Engine facade: owns the schema registry, the operator registry, and the
//! options, and is passed by reference into every entry point. No global
//! mutable state.

use crate::error::EngineError;
use crate::query::{
    search_structured, OperatorRegistry, ParameterParser, RawParams, SearchResult, StructuredQuery,
};
use crate::schema::{discover, SchemaRegistry};
use sqlx::PgPool;
use std::collections::HashSet;

/// How NULL-sentinel request values map onto predicates.
///
/// The legacy convention couples the empty string and NULL: `or__f=null`
/// matches rows where `f = '' OR f IS NULL`, and `not_null` means `f <> ''`.
/// `StoreNative` switches to plain `IS NULL` / `IS NOT NULL` without touching
/// the parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NullSentinelMode {
    #[default]
    EmptyStringConvention,
    StoreNative,
}

/// What to do with a condition whose field is outside the allow-list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllowListPolicy {
    /// Silently exclude the condition (legacy-compatible).
    #[default]
    Drop,
    /// Fail the request with `FieldNotAllowed`.
    Reject,
}

#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// When set, only these leading field names may be filtered on.
    pub allowed_fields: Option<HashSet<String>>,
    pub allow_list_policy: AllowListPolicy,
    pub null_sentinel_mode: NullSentinelMode,
    pub default_page_size: i64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            allowed_fields: None,
            allow_list_policy: AllowListPolicy::default(),
            null_sentinel_mode: NullSentinelMode::default(),
            default_page_size: 10,
        }
    }
}

impl EngineOptions {
    /// Whether a condition led by `field` may enter the predicate.
    /// `Ok(false)` means drop it; an error means reject the request.
    pub fn check_field(&self, field: &str) -> Result<bool, EngineError> {
        match &self.allowed_fields {
            None => Ok(true),
            Some(allowed) if allowed.contains(field) => Ok(true),
            Some(_) => match self.allow_list_policy {
                AllowListPolicy::Drop => Ok(false),
                AllowListPolicy::Reject => Err(EngineError::FieldNotAllowed(field.to_string())),
            },
        }
    }
}

/// One engine per discovered schema: parse, build, execute.
pub struct QueryEngine {
    registry: SchemaRegistry,
    operators: OperatorRegistry,
    options: EngineOptions,
    parser: ParameterParser,
}

impl QueryEngine {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_options(registry, EngineOptions::default())
    }

    pub fn with_options(registry: SchemaRegistry, options: EngineOptions) -> Self {
        let parser = ParameterParser::new(&options);
        Self {
            registry,
            operators: OperatorRegistry::standard(),
            options,
            parser,
        }
    }

    /// Introspect `schema` on the pool and build an engine over it.
    pub async fn discover(
        pool: &PgPool,
        schema: &str,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let registry = discover(pool, schema).await?;
        Ok(Self::with_options(registry, options))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Parse raw request parameters into a structured query.
    pub fn parse(&self, raw: &RawParams) -> Result<StructuredQuery, EngineError> {
        self.parser.parse(raw)
    }

    /// Parse and execute in one step: filtered count plus one page of rows.
    pub async fn search(
        &self,
        pool: &PgPool,
        table: &str,
        raw: &RawParams,
    ) -> Result<SearchResult, EngineError> {
        let query = self.parser.parse(raw)?;
        self.search_structured(pool, table, &query).await
    }

    /// Execute an already-parsed query.
    pub async fn search_structured(
        &self,
        pool: &PgPool,
        table: &str,
        query: &StructuredQuery,
    ) -> Result<SearchResult, EngineError> {
        let entity = self.registry.entity(table)?;
        search_structured(
            pool,
            &self.registry,
            &self.operators,
            &self.options,
            entity,
            query,
        )
        .await
    }
}
