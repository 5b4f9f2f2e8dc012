// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Session lifecycle controller
//!
//! [`Tracer`] holds the current [`Session`], if any, and moves between two
//! states:
//!
//! - **Idle**: no session id, no open streams, no profiler
//! - **Running**: a session id, open streams and a running profiler
//!
//! ## Concurrency
//!
//! `start` and `stop` are serialized by a transition lock. The current
//! session is published as an `Arc<Session>` behind a read/write lock that is
//! only held long enough to clone or swap the pointer, so hooks never wait on
//! file or profiler I/O done by a transition. A hook that grabbed a snapshot
//! just before `stop` may still try to write after the sink was closed; the
//! sink turns that write into a no-op.

use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TracerConfig;
use crate::measure::Measurement;
use crate::profiler::{Profiler, profiler_for};
use crate::record::LogSink;
use crate::session::{Session, session_id_for};

static GLOBAL_TRACER: OnceLock<Arc<Tracer>> = OnceLock::new();

/// Process-wide tracing context
pub struct Tracer {
    config: TracerConfig,
    clock: Arc<dyn Clock>,
    profiler: Arc<dyn Profiler>,
    current: RwLock<Option<Arc<Session>>>,
    transition: Mutex<()>,
}

impl Tracer {
    /// Create a tracer with the system clock and the configured profiler
    pub fn new(config: TracerConfig) -> Arc<Self> {
        Self::builder().with_config(config).build()
    }

    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    /// The process-wide tracer, configured from the environment on first use
    pub fn global() -> &'static Arc<Tracer> {
        GLOBAL_TRACER.get_or_init(|| {
            let config = TracerConfig::from_env().unwrap_or_else(|e| {
                warn!(error = %e, "Invalid tracer configuration, using defaults");
                TracerConfig::default()
            });
            Tracer::new(config)
        })
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Begin a new session, stopping the current one first
    ///
    /// Returns the new session id.
    pub fn start(&self) -> String {
        let _transition = self.transition.lock();
        self.stop_locked();

        let id = session_id_for(self.clock.now_nanos());
        info!(session_id = %id, "Tracing session started");

        let session = Session::open(&self.config, id.clone(), self.profiler.as_ref());
        *self.current.write() = Some(Arc::new(session));
        id
    }

    /// End the current session; a no-op when idle
    pub fn stop(&self) {
        let _transition = self.transition.lock();
        self.stop_locked();
    }

    fn stop_locked(&self) {
        // Publish Idle before closing anything
        let Some(session) = self.current.write().take() else {
            return;
        };

        info!(session_id = %session.id(), "Tracing session stopped");
        session.close();
    }

    /// Id of the running session
    pub fn session_id(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.id().to_string())
    }

    pub fn is_running(&self) -> bool {
        self.current.read().is_some()
    }

    /// Snapshot of the running session
    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub(crate) fn sql_sink(&self) -> Option<Arc<LogSink>> {
        self.current.read().as_ref().and_then(|s| s.sql_sink().cloned())
    }

    /// Start timing a code region, recorded in the performance log
    ///
    /// The target stream is fixed now: a measurement begun while idle is
    /// never written, even if a session starts before it ends.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let m = Tracer::global().begin_measurement("db-warmup", "cache fill");
    /// warm_cache().await;
    /// m.end();
    /// ```
    pub fn begin_measurement(&self, tag: impl Into<String>, text: impl Into<String>) -> Measurement {
        let sink = self
            .current
            .read()
            .as_ref()
            .and_then(|s| s.performance_sink().cloned());
        Measurement::begin(self.clock.clone(), sink, tag.into(), text.into())
    }

    /// Start timing a request handler, recorded in the route log
    ///
    /// Falls back to the performance log when no route log is configured.
    pub fn begin_route_measurement(
        &self,
        tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Measurement {
        let sink = self
            .current
            .read()
            .as_ref()
            .and_then(|s| s.route_sink().cloned());
        Measurement::begin(self.clock.clone(), sink, tag.into(), text.into())
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field("session_id", &self.session_id())
            .finish()
    }
}

/// Builder for isolated tracers
#[derive(Default)]
pub struct TracerBuilder {
    config: TracerConfig,
    clock: Option<Arc<dyn Clock>>,
    profiler: Option<Arc<dyn Profiler>>,
}

impl TracerBuilder {
    pub fn with_config(mut self, config: TracerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the profiler chosen from `config.profiling`
    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn build(self) -> Arc<Tracer> {
        let profiler = self
            .profiler
            .unwrap_or_else(|| profiler_for(self.config.profiling));

        Arc::new(Tracer {
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            profiler,
            config: self.config,
            current: RwLock::new(None),
            transition: Mutex::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::TraceResult;
    use crate::profiler::ProfilerHandle;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProfiler {
        starts: AtomicUsize,
        stops: Arc<AtomicUsize>,
    }

    struct CountingHandle(Arc<AtomicUsize>);

    impl ProfilerHandle for CountingHandle {
        fn stop(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Profiler for CountingProfiler {
        fn start(&self, _dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingHandle(self.stops.clone())))
        }
    }

    fn tracer_in(dir: &Path) -> (Arc<Tracer>, Arc<CountingProfiler>) {
        let profiler = Arc::new(CountingProfiler::default());
        let tracer = Tracer::builder()
            .with_config(TracerConfig::default().with_output_dir(dir))
            .with_clock(Arc::new(ManualClock::new(1_700_000_000_000_000_000)))
            .with_profiler(profiler.clone())
            .build();
        (tracer, profiler)
    }

    #[test]
    fn test_new_tracer_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, profiler) = tracer_in(dir.path());

        assert!(!tracer.is_running());
        assert_eq!(tracer.session_id(), None);
        assert_eq!(profiler.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, profiler) = tracer_in(dir.path());

        let id = tracer.start();
        assert_eq!(tracer.session_id(), Some(id));
        let session = tracer.current_session().unwrap();
        assert!(!session.sql_sink().unwrap().is_closed());

        tracer.stop();
        assert!(!tracer.is_running());
        assert!(session.sql_sink().unwrap().is_closed());
        assert!(session.performance_sink().unwrap().is_closed());
        assert_eq!(profiler.starts.load(Ordering::SeqCst), 1);
        assert_eq!(profiler.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_while_running_closes_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, profiler) = tracer_in(dir.path());

        tracer.start();
        let first = tracer.current_session().unwrap();
        tracer.start();
        let second = tracer.current_session().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.sql_sink().unwrap().is_closed());
        assert!(first.performance_sink().unwrap().is_closed());
        assert!(!second.sql_sink().unwrap().is_closed());
        assert_eq!(profiler.starts.load(Ordering::SeqCst), 2);
        assert_eq!(profiler.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, profiler) = tracer_in(dir.path());

        tracer.stop();
        tracer.stop();

        assert_eq!(profiler.starts.load(Ordering::SeqCst), 0);
        assert_eq!(profiler.stops.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_double_stop_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, profiler) = tracer_in(dir.path());

        tracer.start();
        tracer.stop();
        tracer.stop();

        assert_eq!(profiler.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_id_comes_from_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, _) = tracer_in(dir.path());

        let id = tracer.start();
        assert_eq!(id, session_id_for(1_700_000_000_000_000_000));
    }

    /// Log output collected from a scoped fmt subscriber
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[test]
    fn test_transitions_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let (tracer, _) = tracer_in(dir.path());
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let id = tracing::subscriber::with_default(subscriber, || {
            tracer.start();
            tracer.start()
        });

        let logs = captured.text();
        assert_eq!(logs.matches("Tracing session started").count(), 2);
        assert_eq!(logs.matches("Tracing session stopped").count(), 1);
        assert!(logs.contains(&format!("session_id={id}")));
        assert!(logs.contains("INFO"));
        tracer.stop();
    }

    #[test]
    fn test_profiler_failure_keeps_session_running() {
        struct FailingProfiler;
        impl Profiler for FailingProfiler {
            fn start(&self, _dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>> {
                Err(crate::error::TraceError::Profiler("busy".to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let tracer = Tracer::builder()
            .with_config(TracerConfig::default().with_output_dir(dir.path()))
            .with_profiler(Arc::new(FailingProfiler))
            .build();

        tracer.start();
        let session = tracer.current_session().unwrap();
        assert!(!session.has_profiler());
        assert!(session.sql_sink().is_some());
        tracer.stop();
    }
}
