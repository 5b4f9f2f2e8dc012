// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Manual stopwatch for timing code regions
//!
//! # Example
//!
//! ```ignore
//! use isutrace::Tracer;
//!
//! async fn get_user(id: i64) -> Response {
//!     let m = Tracer::global().begin_route_measurement("GET /users/:id", format!("id={id}"));
//!     let response = load_user(id).await;
//!     m.end();
//!     response
//! }
//! ```
//!
//! Unlike a scope guard, nothing is recorded when a measurement is dropped
//! without calling [`Measurement::end`].

use std::sync::Arc;

use crate::clock::Clock;
use crate::record::{LogSink, TimingRecord};

/// A started measurement
///
/// Holds the stream that was current when it began. If tracing was idle
/// then, [`Measurement::end`] writes nothing.
///
/// # Overhead
///
/// Construction reads the clock once and clones an `Arc`. Ending reads the
/// clock and appends one line to the captured stream.
#[must_use = "a measurement records nothing unless `end` is called"]
pub struct Measurement {
    start_nanos: i64,
    tag: String,
    text: String,
    sink: Option<Arc<LogSink>>,
    clock: Arc<dyn Clock>,
}

impl Measurement {
    pub(crate) fn begin(
        clock: Arc<dyn Clock>,
        sink: Option<Arc<LogSink>>,
        tag: String,
        text: String,
    ) -> Self {
        Self {
            start_nanos: clock.now_nanos(),
            tag,
            text,
            sink,
            clock,
        }
    }

    pub fn start_nanos(&self) -> i64 {
        self.start_nanos
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this measurement will write a record when ended
    pub fn is_recording(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Stop the stopwatch and append `(start, elapsed, tag, text)`
    pub fn end(self) {
        let Some(sink) = &self.sink else {
            return;
        };

        let elapsed = self.clock.now_nanos() - self.start_nanos;
        sink.append(&TimingRecord::new(
            self.start_nanos,
            elapsed,
            &self.tag,
            &self.text,
        ));
    }
}

impl std::fmt::Debug for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Measurement")
            .field("start_nanos", &self.start_nanos)
            .field("tag", &self.tag)
            .field("text", &self.text)
            .field("recording", &self.is_recording())
            .finish()
    }
}
