// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Time sources for timing records
//!
//! All timestamps are wall-clock nanoseconds since the Unix epoch, so a
//! record's start time can be lined up with other logs after the fact.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of nanosecond timestamps
pub trait Clock: Send + Sync {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> i64;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to
///
/// # Example
///
/// ```ignore
/// let clock = Arc::new(ManualClock::new(1_000));
/// let tracer = Tracer::builder().with_clock(clock.clone()).build();
/// clock.advance(42);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(start_nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(start_nanos),
        }
    }

    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_nanos: i64) {
        self.nanos.fetch_add(delta_nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
