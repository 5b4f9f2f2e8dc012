// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Tracing sessions
//!
//! A [`Session`] is one Start→Stop interval. It owns the open log streams
//! and the running profiler. Sessions are immutable once opened, apart from
//! being closed, so hooks can hold an `Arc<Session>` snapshot without locks.
//!
//! Opening never fails as a whole: a stream whose file cannot be created is
//! left unset and the others stay open.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::config::TracerConfig;
use crate::profiler::{Profiler, ProfilerHandle};
use crate::record::LogSink;

/// Session id for a start time: local time as `YYYYMMDD-HHMMSS`
pub fn session_id_for(start_nanos: i64) -> String {
    Local
        .timestamp_nanos(start_nanos)
        .format("%Y%m%d-%H%M%S")
        .to_string()
}

/// One open tracing session
pub struct Session {
    id: String,
    dir: PathBuf,
    sql: Option<Arc<LogSink>>,
    performance: Option<Arc<LogSink>>,
    route: Option<Arc<LogSink>>,
    profiler: Mutex<Option<Box<dyn ProfilerHandle>>>,
}

impl Session {
    /// Create the session directory, start the profiler and open every stream
    pub(crate) fn open(config: &TracerConfig, id: String, profiler: &dyn Profiler) -> Self {
        let dir = session_dir(config, &id);

        let profiler = match profiler.start(&dir) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(session_id = %id, error = %e, "Failed to start profiler");
                None
            }
        };

        let sql = open_sink(&dir, &config.sql_log_name);
        let performance = open_sink(&dir, &config.performance_log_name);
        let route = config
            .route_log_name
            .as_deref()
            .and_then(|name| open_sink(&dir, name));

        Self {
            id,
            dir,
            sql,
            performance,
            route,
            profiler: Mutex::new(profiler),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory this session writes into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sql_sink(&self) -> Option<&Arc<LogSink>> {
        self.sql.as_ref()
    }

    pub fn performance_sink(&self) -> Option<&Arc<LogSink>> {
        self.performance.as_ref()
    }

    /// The route stream when configured, otherwise the performance stream
    pub fn route_sink(&self) -> Option<&Arc<LogSink>> {
        self.route.as_ref().or(self.performance.as_ref())
    }

    pub fn has_profiler(&self) -> bool {
        self.profiler.lock().is_some()
    }

    /// Stop the profiler and close every stream
    ///
    /// Safe to call more than once; later calls find nothing left to close.
    pub(crate) fn close(&self) {
        let handle = self.profiler.lock().take();
        if let Some(handle) = handle {
            handle.stop();
        }

        for sink in [&self.sql, &self.performance, &self.route].into_iter().flatten() {
            sink.close();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("dir", &self.dir)
            .field("sql", &self.sql.as_ref().map(|s| s.path().to_path_buf()))
            .field(
                "performance",
                &self.performance.as_ref().map(|s| s.path().to_path_buf()),
            )
            .field("route", &self.route.as_ref().map(|s| s.path().to_path_buf()))
            .finish()
    }
}

fn session_dir(config: &TracerConfig, id: &str) -> PathBuf {
    let dir = if config.session_dirs {
        config.output_dir.join(id)
    } else {
        config.output_dir.clone()
    };

    match fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(e) if config.session_dirs => {
            warn!(
                dir = %dir.display(),
                error = %e,
                "Failed to create session directory, falling back to output directory"
            );
            config.output_dir.clone()
        }
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Failed to create output directory");
            dir
        }
    }
}

fn open_sink(dir: &Path, name: &str) -> Option<Arc<LogSink>> {
    match LogSink::create(dir.join(name)) {
        Ok(sink) => Some(Arc::new(sink)),
        Err(e) => {
            error!(error = %e, "Failed to create log file, stream disabled");
            None
        }
    }
}
