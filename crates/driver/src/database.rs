// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Database handle
//!
//! [`Database`] is what application code talks to. It resolves a driver by
//! name, opens one connection and runs statements on it, falling back from the
//! connection fast path to a prepared statement when the driver answers
//! [`DriverError::Skip`].

use crate::error::{DriverError, DriverResult, RegistryError};
use crate::registry::DriverRegistry;
use crate::r#trait::Connection;
use crate::value::{ExecResult, NamedValue, Rows};

/// An open connection obtained through a named driver
pub struct Database {
    driver_name: String,
    conn: Option<Box<dyn Connection>>,
}

impl Database {
    /// Open a connection through the driver registered as `driver_name`
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let mut db = Database::open(DriverRegistry::global(), "mysql:logger", dsn).await?;
    /// let rows = db.query("SELECT /* list-users */ * FROM users", &[]).await?;
    /// ```
    pub async fn open(
        registry: &DriverRegistry,
        driver_name: &str,
        dsn: &str,
    ) -> DriverResult<Self> {
        let driver = registry.driver(driver_name).ok_or_else(|| {
            DriverError::Connection(RegistryError::Unknown(driver_name.to_string()).to_string())
        })?;

        let conn = driver.open(dsn).await?;
        Ok(Self {
            driver_name: driver_name.to_string(),
            conn: Some(conn),
        })
    }

    /// Name of the driver this database was opened with
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    fn conn(&mut self) -> DriverResult<&mut Box<dyn Connection>> {
        self.conn.as_mut().ok_or(DriverError::Closed)
    }

    /// Execute a statement that returns no rows
    pub async fn exec(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult> {
        let conn = self.conn()?;
        match conn.exec(query, args).await {
            Err(DriverError::Skip) => {
                let mut stmt = conn
                    .prepare(query)
                    .await
                    .map_err(|e| declined_twice(e, query))?;
                let result = stmt.exec(args).await;
                close_statement(stmt).await;
                result.map_err(|e| declined_twice(e, query))
            }
            other => other,
        }
    }

    /// Execute a statement that returns rows
    pub async fn query(&mut self, query: &str, args: &[NamedValue]) -> DriverResult<Rows> {
        let conn = self.conn()?;
        match conn.query(query, args).await {
            Err(DriverError::Skip) => {
                let mut stmt = conn
                    .prepare(query)
                    .await
                    .map_err(|e| declined_twice(e, query))?;
                let result = stmt.query(args).await;
                close_statement(stmt).await;
                result.map_err(|e| declined_twice(e, query))
            }
            other => other,
        }
    }

    pub async fn ping(&mut self) -> DriverResult<()> {
        self.conn()?.ping().await
    }

    pub async fn begin(&mut self) -> DriverResult<()> {
        self.conn()?.begin().await
    }

    pub async fn commit(&mut self) -> DriverResult<()> {
        self.conn()?.commit().await
    }

    pub async fn rollback(&mut self) -> DriverResult<()> {
        self.conn()?.rollback().await
    }

    /// Close the underlying connection
    ///
    /// Further calls return `DriverError::Closed`.
    pub async fn close(&mut self) -> DriverResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }
}

/// A `Skip` from the fallback path has nowhere left to go
fn declined_twice(e: DriverError, query: &str) -> DriverError {
    match e {
        DriverError::Skip => {
            DriverError::NotSupported(format!("driver declined statement on every path: {query}"))
        }
        other => other,
    }
}

async fn close_statement(stmt: Box<dyn crate::r#trait::Statement>) {
    if let Err(e) = stmt.close().await {
        tracing::debug!(error = %e, "Failed to close prepared statement");
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("driver_name", &self.driver_name)
            .field("open", &self.conn.is_some())
            .finish()
    }
}
