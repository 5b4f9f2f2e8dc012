// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Tracer Configuration
//!
//! This module provides configuration management for the tracer.
//!
//! ## Configuration Structure
//!
//! The tracer configuration includes:
//! - Output directory and per-session subdirectories
//! - Log file names for the SQL, performance and optional route streams
//! - The suffix appended to instrumented driver names
//! - Profiling mode
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ISUTRACE_OUTPUT_DIR` | `output_dir` |
//! | `ISUTRACE_SESSION_DIRS` | `session_dirs` (`1`/`true`/`yes`, `0`/`false`/`no`) |
//! | `ISUTRACE_ROUTE_LOG` | `route_log_name` (empty disables) |
//! | `ISUTRACE_DRIVER_SUFFIX` | `driver_suffix` |
//! | `ISUTRACE_PROFILE` | `profiling` (`off`, `cpu`, `heap`) |
//!
//! ## Example
//!
//! ```rust,ignore
//! use isutrace::TracerConfig;
//!
//! let config = TracerConfig::default()
//!     .with_output_dir("/var/tmp/bench")
//!     .with_session_dirs(true)
//!     .with_route_log("route.log");
//! config.validate()?;
//! ```

use std::path::PathBuf;

pub const ENV_OUTPUT_DIR: &str = "ISUTRACE_OUTPUT_DIR";
pub const ENV_SESSION_DIRS: &str = "ISUTRACE_SESSION_DIRS";
pub const ENV_ROUTE_LOG: &str = "ISUTRACE_ROUTE_LOG";
pub const ENV_DRIVER_SUFFIX: &str = "ISUTRACE_DRIVER_SUFFIX";
pub const ENV_PROFILE: &str = "ISUTRACE_PROFILE";

/// Suffix appended to a driver name to form its instrumented twin
pub const DEFAULT_DRIVER_SUFFIX: &str = ":logger";

/// What the profiler records during a session
///
/// Defaults to [`ProfilingMode::Cpu`] when built with the `pprof` feature,
/// [`ProfilingMode::Off`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// No profiler runs
    Off,
    /// Sampled CPU profile in pprof format (requires the `pprof` feature, unix only)
    Cpu,
    /// dhat heap profile (requires the `dhat` feature)
    Heap,
}

impl Default for ProfilingMode {
    fn default() -> Self {
        if cfg!(all(unix, feature = "pprof")) {
            Self::Cpu
        } else {
            Self::Off
        }
    }
}

/// Main tracer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerConfig {
    /// Root directory for session output
    pub output_dir: PathBuf,

    /// Write each session under `<output_dir>/<session_id>/`
    pub session_dirs: bool,

    /// File name of the SQL log
    pub sql_log_name: String,

    /// File name of the performance log
    pub performance_log_name: String,

    /// File name of the route log; route measurements share the
    /// performance log when unset
    pub route_log_name: Option<String>,

    /// Suffix of instrumented driver names
    pub driver_suffix: String,

    /// Profiler to run alongside each session
    pub profiling: ProfilingMode,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            session_dirs: false,
            sql_log_name: "sql.log".to_string(),
            performance_log_name: "performance.log".to_string(),
            route_log_name: None,
            driver_suffix: DEFAULT_DRIVER_SUFFIX.to_string(),
            profiling: ProfilingMode::default(),
        }
    }
}

impl TracerConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_session_dirs(mut self, enabled: bool) -> Self {
        self.session_dirs = enabled;
        self
    }

    pub fn with_sql_log(mut self, name: impl Into<String>) -> Self {
        self.sql_log_name = name.into();
        self
    }

    pub fn with_performance_log(mut self, name: impl Into<String>) -> Self {
        self.performance_log_name = name.into();
        self
    }

    pub fn with_route_log(mut self, name: impl Into<String>) -> Self {
        self.route_log_name = Some(name.into());
        self
    }

    pub fn with_driver_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.driver_suffix = suffix.into();
        self
    }

    pub fn with_profiling(mut self, mode: ProfilingMode) -> Self {
        self.profiling = mode;
        self
    }

    /// Validate the configuration
    ///
    /// Checks that:
    /// - The driver suffix is not empty
    /// - Every log name is non-empty
    /// - No two streams share a file
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver_suffix.is_empty() {
            return Err(ConfigError::EmptyDriverSuffix);
        }

        let mut names = vec![
            ("sql", self.sql_log_name.as_str()),
            ("performance", self.performance_log_name.as_str()),
        ];
        if let Some(route) = &self.route_log_name {
            names.push(("route", route.as_str()));
        }

        for &(stream, name) in &names {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyLogName { stream });
            }
        }

        for (i, (_, a)) in names.iter().enumerate() {
            if names[i + 1..].iter().any(|(_, b)| a == b) {
                return Err(ConfigError::DuplicateLogName {
                    name: a.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Build a configuration from `ISUTRACE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(value) = lookup(ENV_SESSION_DIRS) {
            config.session_dirs = parse_flag(ENV_SESSION_DIRS, &value)?;
        }

        if let Some(value) = lookup(ENV_ROUTE_LOG) {
            config.route_log_name = Some(value).filter(|v| !v.is_empty());
        }

        if let Some(value) = lookup(ENV_DRIVER_SUFFIX) {
            config.driver_suffix = value;
        }

        if let Some(value) = lookup(ENV_PROFILE) {
            config.profiling = match value.to_ascii_lowercase().as_str() {
                "" | "off" | "none" => ProfilingMode::Off,
                "cpu" => ProfilingMode::Cpu,
                "heap" => ProfilingMode::Heap,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_PROFILE,
                        value,
                    });
                }
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Instrumented drivers would shadow their originals
    #[error("Driver suffix must not be empty")]
    EmptyDriverSuffix,

    /// A stream has no file name
    #[error("Log file name for the {stream} stream must not be empty")]
    EmptyLogName { stream: &'static str },

    /// Two streams would write the same file
    #[error("Log file name '{name}' is used by more than one stream")]
    DuplicateLogName { name: String },

    /// An environment value could not be parsed
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
