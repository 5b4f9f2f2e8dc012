// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for driver operations
//!
//! This module defines the error types returned by drivers, connections and
//! the driver registry.

use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that can occur during driver operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// The driver declined to handle the call; the caller should fall back
    /// to the prepared-statement path
    ///
    /// This is never an error from the host application's point of view.
    /// [`Database`](crate::Database) consumes it and retries.
    #[error("driver declined the call, fallback required")]
    Skip,

    /// Failed to open or keep a connection
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    /// Statement execution failed
    #[error("Statement execution failed: {0}")]
    Execution(String),

    /// The operation is not implemented by this driver
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// The connection or statement was already closed
    #[error("Connection is closed")]
    Closed,
}

impl DriverError {
    /// Whether this outcome is the "try the next path" sentinel
    pub fn is_skip(&self) -> bool {
        matches!(self, DriverError::Skip)
    }
}

/// Errors raised by the driver registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A driver is already registered under this name
    #[error("Driver '{0}' is already registered")]
    Duplicate(String),

    /// No driver is registered under this name
    #[error("Unknown driver '{0}' (forgotten registration?)")]
    Unknown(String),

    /// Driver names must not be empty
    #[error("Driver name must not be empty")]
    EmptyName,
}
