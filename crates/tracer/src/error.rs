// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for tracing operations
//!
//! These errors stay inside the crate boundary: lifecycle transitions and
//! hooks report them through `tracing` and carry on, so the instrumented
//! application never sees them.

use std::path::PathBuf;

use isutrace_driver::RegistryError;
use thiserror::Error;

/// Result type alias for tracing operations
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors that can occur while running a tracing session
#[derive(Debug, Error)]
pub enum TraceError {
    /// A log file or session directory could not be created
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profiler refused to start or could not write its report
    #[error("Profiler failed: {0}")]
    Profiler(String),

    /// A derived driver could not be registered
    #[error("Driver registration failed: {0}")]
    Registry(#[from] RegistryError),
}

impl TraceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TraceError::Io {
            path: path.into(),
            source,
        }
    }
}
