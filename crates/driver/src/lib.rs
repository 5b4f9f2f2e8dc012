// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # isutrace - Driver Layer
//!
//! This crate defines the database driver contract that isutrace instruments.
//!
//! - [`Driver`], [`Connection`] and [`Statement`]: the async calling contract
//! - [`DriverRegistry`]: the process-wide, name-keyed driver table
//! - [`Database`]: an application-facing handle that retries
//!   [`DriverError::Skip`] outcomes through the prepared-statement path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isutrace_driver::{Database, DriverRegistry, NamedValue};
//!
//! async fn count_users(dsn: &str) -> isutrace_driver::DriverResult<usize> {
//!     let mut db = Database::open(DriverRegistry::global(), "mysql:logger", dsn).await?;
//!     let rows = db
//!         .query("SELECT /* count-users */ id FROM users WHERE active = ?", &NamedValue::from_values([true]))
//!         .await?;
//!     Ok(rows.len())
//! }
//! ```
//!
//! With the `sqlx` feature, `register_sqlx_drivers` installs real MySQL,
//! PostgreSQL and SQLite backends.

pub mod database;
pub mod error;
pub mod registry;
#[cfg(feature = "sqlx")]
pub mod sqlx_any;
pub mod r#trait;
pub mod value;

// Re-exports
pub use database::Database;
pub use error::{DriverError, DriverResult, RegistryError};
pub use registry::DriverRegistry;
#[cfg(feature = "sqlx")]
pub use sqlx_any::{SQLX_DRIVER_NAMES, SqlxAnyDriver, register_sqlx_drivers};
pub use r#trait::{Connection, Driver, Statement};
pub use value::{ExecResult, NamedValue, Rows, Value};
