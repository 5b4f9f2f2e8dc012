// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # isutrace
//!
//! Timing instrumentation for live performance tuning. SQL statements run
//! through an instrumented driver and hand-marked code regions are written
//! as tab-separated records while a tracing session is running. Sessions are
//! started and stopped from outside the process with signals.
//!
//! ## Architecture
//!
//! ```text
//!  SIGUSR1 / SIGUSR2 / SIGHUP / SIGINT ...
//!                │
//!                ↓
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │    Signal dispatcher     │─────→│          Tracer          │
//! └──────────────────────────┘      │  Idle ⇄ Running(Session) │
//!                                   └────────────┬─────────────┘
//!                                                │ snapshot
//!            ┌───────────────────────────────────┼──────────────┐
//!            ↓                                   ↓              ↓
//! ┌──────────────────────┐            ┌──────────────┐  ┌───────────────┐
//! │ ProxyDriver          │            │ Measurement  │  │ Profiler      │
//! │  "mysql:logger"      │──sql.log   │              │  │ (pprof/dhat)  │
//! └──────────┬───────────┘            └──────┬───────┘  └───────────────┘
//!            ↓                               ↓
//!     wrapped driver               performance.log / route log
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isutrace_driver::{Database, DriverRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     isutrace_driver::register_sqlx_drivers(DriverRegistry::global())?;
//!     isutrace::init();
//!
//!     let mut db = Database::open(DriverRegistry::global(), "mysql:logger", &dsn).await?;
//!     db.exec("UPDATE /* bump-score */ users SET score = score + 1", &[]).await?;
//!     Ok(())
//! }
//! ```
//!
//! Then `kill -USR1 <pid>` to start a session and `kill -USR2 <pid>` to stop it.

pub mod clock;
pub mod config;
pub mod error;
pub mod hooks;
pub mod measure;
pub mod profiler;
pub mod proxy;
pub mod query;
pub mod record;
pub mod registrar;
pub mod session;
pub mod signals;
pub mod tracer;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use isutrace_driver::DriverRegistry;
use tracing::{debug, error};

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ProfilingMode, TracerConfig};
pub use error::{TraceError, TraceResult};
pub use hooks::{CallContext, Hooks, SqlTimingHooks};
pub use measure::Measurement;
pub use profiler::{NoopProfiler, Profiler, ProfilerHandle, profiler_for};
pub use proxy::ProxyDriver;
pub use query::{ExtractedQuery, extract, normalize};
pub use record::{LogSink, TimingRecord};
pub use registrar::register_instrumentation;
pub use session::{Session, session_id_for};
pub use signals::{SignalAction, TraceSignal, spawn_signal_dispatcher};
pub use tracer::{Tracer, TracerBuilder};

static SIGNAL_LISTENER_STARTED: AtomicBool = AtomicBool::new(false);

/// Instrument the global driver registry and start listening for signals
///
/// Safe to call more than once: later calls only instrument drivers
/// registered since, and the signal listener is started once per process.
///
/// Returns the derived driver names registered by this call.
pub fn init() -> Vec<String> {
    let tracer = Tracer::global();
    let registered = register_instrumentation(DriverRegistry::global(), tracer);

    if !SIGNAL_LISTENER_STARTED.swap(true, Ordering::SeqCst) {
        start_signal_listener(tracer.clone());
    }

    registered
}

/// Run the dispatcher on a dedicated thread with its own runtime
///
/// The listener must outlive any runtime the host builds and drops, so it
/// never borrows the caller's. Returns once the handlers are installed.
fn start_signal_listener(tracer: Arc<Tracer>) {
    let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<()>>(1);

    let spawned = std::thread::Builder::new()
        .name("isutrace-signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            runtime.block_on(async move {
                match spawn_signal_dispatcher(tracer) {
                    Ok(task) => {
                        let _ = ready_tx.send(Ok(()));
                        if let Err(e) = task.await {
                            error!(error = %e, "Signal listener stopped");
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            });
        });

    if let Err(e) = spawned {
        error!(error = %e, "Failed to spawn signal listener thread");
        return;
    }

    match ready_rx.recv() {
        Ok(Ok(())) => debug!("Signal listener ready"),
        Ok(Err(e)) => error!(error = %e, "Failed to install signal handlers"),
        Err(_) => error!("Signal listener thread exited before installing handlers"),
    }
}
