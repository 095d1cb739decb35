//! Forwarding CRUD by primary key against PostgreSQL. These operations do not
//! involve the filter engine; they are plain parameterized statements.

use crate::error::EngineError;
use crate::schema::{EntityInfo, PkType};
use crate::sql::{delete, insert, row_to_json, select_by_id, update, PgBindValue, Statement};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;

pub struct CrudService;

impl CrudService {
    /// Insert one row; body may include or omit defaulted columns. Returns
    /// the created row.
    pub async fn create(
        pool: &PgPool,
        entity: &EntityInfo,
        body: &HashMap<String, Value>,
    ) -> Result<Value, EngineError> {
        let statement = insert(entity, body);
        Self::fetch_one(pool, &statement)
            .await?
            .ok_or(EngineError::Execution(sqlx::Error::RowNotFound))
    }

    /// Fetch one row by primary key.
    pub async fn read(
        pool: &PgPool,
        entity: &EntityInfo,
        id: &str,
    ) -> Result<Option<Value>, EngineError> {
        let statement = select_by_id(entity, parse_id(id, &entity.pk_type)?);
        Self::fetch_one(pool, &statement).await
    }

    /// Update one row by primary key; returns the updated row.
    pub async fn update(
        pool: &PgPool,
        entity: &EntityInfo,
        id: &str,
        body: &HashMap<String, Value>,
    ) -> Result<Option<Value>, EngineError> {
        let statement = update(entity, parse_id(id, &entity.pk_type)?, body);
        Self::fetch_one(pool, &statement).await
    }

    /// Delete one row by primary key; returns the deleted row.
    pub async fn delete(
        pool: &PgPool,
        entity: &EntityInfo,
        id: &str,
    ) -> Result<Option<Value>, EngineError> {
        let statement = delete(entity, parse_id(id, &entity.pk_type)?);
        Self::fetch_one(pool, &statement).await
    }

    async fn fetch_one(pool: &PgPool, statement: &Statement) -> Result<Option<Value>, EngineError> {
        tracing::debug!(sql = %statement.sql, params = ?statement.params, "query");
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.clone());
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

fn parse_id(id: &str, pk_type: &PkType) -> Result<PgBindValue, EngineError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id)
                .map_err(|_| EngineError::InvalidId(id.to_string()))?;
            PgBindValue::Uuid(u)
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id
                .parse()
                .map_err(|_| EngineError::InvalidId(id.to_string()))?;
            PgBindValue::I64(n)
        }
        PkType::Text => PgBindValue::String(id.to_string()),
    })
}
