// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Timing records and log sinks
//!
//! Every log stream is a tab-separated text file with one record per line:
//!
//! ```text
//! startTimestampNanos \t elapsedNanos \t tag \t text
//! ```
//!
//! For the SQL log `text` is the normalized query; for the performance and
//! route logs it is the free-form description given to the measurement.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{TraceError, TraceResult};

/// One line of a log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord<'a> {
    pub start_nanos: i64,
    pub elapsed_nanos: i64,
    pub tag: &'a str,
    pub text: &'a str,
}

impl<'a> TimingRecord<'a> {
    pub fn new(start_nanos: i64, elapsed_nanos: i64, tag: &'a str, text: &'a str) -> Self {
        Self {
            start_nanos,
            elapsed_nanos,
            tag,
            text,
        }
    }

    /// The record as a newline-terminated line
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

/// Tabs and line breaks would split the record; replace them with spaces
fn single_field(value: &str) -> Cow<'_, str> {
    if value.contains(['\t', '\n', '\r']) {
        Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

impl fmt::Display for TimingRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.start_nanos,
            self.elapsed_nanos,
            single_field(self.tag),
            single_field(self.text)
        )
    }
}

/// An append-only log file shared by every writer of one stream
///
/// Each record is written with a single `write_all` while holding the
/// sink's lock, so concurrent writers never interleave within a line.
/// Once closed, appends are silently dropped.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl Into<PathBuf>) -> TraceResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| TraceError::io(&path, e))?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; returns whether it reached the file
    pub fn append(&self, record: &TimingRecord<'_>) -> bool {
        let line = record.to_line();
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            tracing::debug!(path = %self.path.display(), "Dropped record for closed log");
            return false;
        };

        match file.write_all(line.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Failed to append record");
                false
            }
        }
    }

    /// Close the file; later appends become no-ops
    pub fn close(&self) {
        let file = self.file.lock().take();
        if let Some(file) = file {
            if let Err(e) = file.sync_all() {
                tracing::debug!(path = %self.path.display(), error = %e, "Failed to sync log on close");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}
