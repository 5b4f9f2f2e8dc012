// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlx-backed driver
//!
//! Adapts `sqlx::any` connections to the [`Driver`] contract so real MySQL,
//! PostgreSQL and SQLite databases can be registered and instrumented.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isutrace_driver::{Database, DriverRegistry, register_sqlx_drivers};
//!
//! register_sqlx_drivers(DriverRegistry::global())?;
//! let mut db = Database::open(DriverRegistry::global(), "mysql", "mysql://localhost/app").await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Column, Connection as _, Executor, Row};

use crate::error::{DriverError, DriverResult, RegistryError};
use crate::registry::DriverRegistry;
use crate::r#trait::{Connection, Driver};
use crate::value::{ExecResult, NamedValue, Rows, Value};

/// Driver names registered by [`register_sqlx_drivers`]
pub const SQLX_DRIVER_NAMES: [&str; 3] = ["mysql", "postgres", "sqlite"];

/// A driver that opens `sqlx::AnyConnection`s
///
/// The DSN is passed to sqlx unchanged, so its scheme selects the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxAnyDriver;

#[async_trait]
impl Driver for SqlxAnyDriver {
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>> {
        let conn = AnyConnection::connect(dsn)
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))?;
        Ok(Box::new(SqlxAnyConnection { conn }))
    }
}

/// Install sqlx's default backends and register them by name
pub fn register_sqlx_drivers(registry: &DriverRegistry) -> Result<(), RegistryError> {
    sqlx::any::install_default_drivers();

    for name in SQLX_DRIVER_NAMES {
        if registry.contains(name) {
            continue;
        }
        registry.register(name, Arc::new(SqlxAnyDriver))?;
    }
    Ok(())
}

struct SqlxAnyConnection {
    conn: AnyConnection,
}

fn bind_args<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[NamedValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    let mut ordered: Vec<&NamedValue> = args.iter().collect();
    ordered.sort_by_key(|arg| arg.ordinal);

    for arg in ordered {
        query = match &arg.value {
            Value::Null => query.bind(Option::<i64>::None),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Bool(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Bytes(v) => query.bind(v.clone()),
        };
    }
    query
}

fn decode_value(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

fn execution_error(e: sqlx::Error) -> DriverError {
    DriverError::Execution(e.to_string())
}

#[async_trait]
impl Connection for SqlxAnyConnection {
    async fn exec(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult> {
        let result = bind_args(sqlx::query(query), args)
            .execute(&mut self.conn)
            .await
            .map_err(execution_error)?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn query(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<Rows> {
        let fetched = bind_args(sqlx::query(query), args)
            .fetch_all(&mut self.conn)
            .await
            .map_err(execution_error)?;

        let columns = fetched
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = fetched
            .iter()
            .map(|row| (0..row.len()).map(|idx| decode_value(row, idx)).collect())
            .collect();

        Ok(Rows { columns, rows })
    }

    async fn ping(&mut self) -> DriverResult<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))
    }

    async fn begin(&mut self) -> DriverResult<()> {
        (&mut self.conn).execute("BEGIN").await.map_err(execution_error)?;
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        (&mut self.conn).execute("COMMIT").await.map_err(execution_error)?;
        Ok(())
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        (&mut self.conn).execute("ROLLBACK").await.map_err(execution_error)?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))
    }
}
