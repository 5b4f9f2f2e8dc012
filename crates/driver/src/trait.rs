// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Driver traits
//!
//! This module defines the async calling contract every database driver
//! implements. Drivers are registered by name in a
//! [`DriverRegistry`](crate::DriverRegistry) and opened through
//! [`Database`](crate::Database).
//!
//! The contract mirrors a classic SQL driver interface: a driver opens
//! connections, a connection executes statements directly (the fast path) or
//! prepares them, and a prepared statement executes with bound parameters.

use crate::error::{DriverError, DriverResult};
use crate::value::{ExecResult, NamedValue, Rows};

/// A database driver
///
/// # Examples
///
/// ```rust,ignore
/// use isutrace_driver::{Driver, DriverRegistry};
/// use std::sync::Arc;
///
/// DriverRegistry::global().register("mock", Arc::new(MyDriver))?;
/// ```
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection using a driver-specific data source name
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Connection` if the connection cannot be established.
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>>;
}

/// A single database connection
///
/// `exec` and `query` are the direct fast path. A connection may return
/// [`DriverError::Skip`] from either to ask the caller to fall back to
/// [`Connection::prepare`] followed by a statement call.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Execute a statement that returns no rows
    async fn exec(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult>;

    /// Execute a statement that returns rows
    async fn query(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<Rows>;

    /// Prepare a statement for later execution
    async fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Statement>> {
        Err(DriverError::NotSupported(format!("prepare: {query}")))
    }

    /// Verify the connection is still alive
    async fn ping(&mut self) -> DriverResult<()> {
        Ok(())
    }

    /// Begin a transaction
    async fn begin(&mut self) -> DriverResult<()> {
        Err(DriverError::NotSupported("begin".to_string()))
    }

    /// Commit the current transaction
    async fn commit(&mut self) -> DriverResult<()> {
        Err(DriverError::NotSupported("commit".to_string()))
    }

    /// Roll back the current transaction
    async fn rollback(&mut self) -> DriverResult<()> {
        Err(DriverError::NotSupported("rollback".to_string()))
    }

    /// Close the connection
    async fn close(self: Box<Self>) -> DriverResult<()> {
        Ok(())
    }
}

/// A prepared statement bound to one connection
#[async_trait::async_trait]
pub trait Statement: Send {
    /// The SQL text this statement was prepared from
    fn query_text(&self) -> &str;

    /// Execute the statement with the given arguments
    async fn exec(&mut self, args: &[NamedValue]) -> DriverResult<ExecResult>;

    /// Execute the statement and return its rows
    async fn query(&mut self, args: &[NamedValue]) -> DriverResult<Rows>;

    /// Release the statement
    async fn close(self: Box<Self>) -> DriverResult<()> {
        Ok(())
    }
}
