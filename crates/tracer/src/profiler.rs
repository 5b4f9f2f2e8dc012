// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Profiler seam
//!
//! A session starts a profiler against its output directory and stops it on
//! shutdown; the profile format is the profiler's business.
//!
//! - `pprof` feature (unix): [`CpuProfiler`] samples the process and writes a
//!   protobuf profile to `<dir>/cpu.pb`, readable with `go tool pprof`.
//! - `dhat` feature: [`DhatProfiler`] records a heap profile to
//!   `<dir>/dhat-heap.json`. The host must install `dhat::Alloc` as its
//!   global allocator for the profile to contain allocation data.

use std::path::Path;
use std::sync::Arc;

use crate::config::ProfilingMode;
use crate::error::TraceResult;

/// Something that can profile the process into a directory
pub trait Profiler: Send + Sync {
    fn start(&self, output_dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>>;
}

/// A running profile
pub trait ProfilerHandle: Send {
    /// Stop profiling and flush output
    fn stop(self: Box<Self>);
}

/// A profiler that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfiler;

struct NoopHandle;

impl ProfilerHandle for NoopHandle {
    fn stop(self: Box<Self>) {}
}

impl Profiler for NoopProfiler {
    fn start(&self, _output_dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>> {
        Ok(Box::new(NoopHandle))
    }
}

#[cfg(all(unix, feature = "pprof"))]
pub use cpu::{CPU_PROFILE_FILE, CpuProfiler};

#[cfg(all(unix, feature = "pprof"))]
mod cpu {
    use std::path::{Path, PathBuf};

    use pprof::protos::Message;
    use tracing::{debug, error};

    use super::{Profiler, ProfilerHandle};
    use crate::error::{TraceError, TraceResult};

    pub const CPU_PROFILE_FILE: &str = "cpu.pb";

    /// Samples per second
    const FREQUENCY: i32 = 1000;

    /// Frames from these libraries break the unwinder
    const BLOCKLIST: &[&str] = &["libc", "libgcc", "pthread", "vdso"];

    /// CPU profiler backed by pprof
    #[derive(Debug, Clone, Copy, Default)]
    pub struct CpuProfiler;

    struct CpuHandle {
        guard: pprof::ProfilerGuard<'static>,
        path: PathBuf,
    }

    impl CpuHandle {
        fn write_profile(&self) -> TraceResult<()> {
            let report = self
                .guard
                .report()
                .build()
                .map_err(|e| TraceError::Profiler(e.to_string()))?;
            let profile = report
                .pprof()
                .map_err(|e| TraceError::Profiler(e.to_string()))?;

            let mut content = Vec::new();
            profile
                .encode(&mut content)
                .map_err(|e| TraceError::Profiler(e.to_string()))?;
            std::fs::write(&self.path, content).map_err(|e| TraceError::io(&self.path, e))
        }
    }

    impl ProfilerHandle for CpuHandle {
        fn stop(self: Box<Self>) {
            match self.write_profile() {
                Ok(()) => debug!(path = %self.path.display(), "CPU profile written"),
                Err(e) => {
                    error!(error = %e, path = %self.path.display(), "Failed to write CPU profile")
                }
            }
            // Sampling ends when the guard drops
        }
    }

    impl Profiler for CpuProfiler {
        fn start(&self, output_dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>> {
            let guard = pprof::ProfilerGuardBuilder::default()
                .frequency(FREQUENCY)
                .blocklist(BLOCKLIST)
                .build()
                .map_err(|e| TraceError::Profiler(e.to_string()))?;
            Ok(Box::new(CpuHandle {
                guard,
                path: output_dir.join(CPU_PROFILE_FILE),
            }))
        }
    }
}

#[cfg(feature = "dhat")]
pub use heap::{DHAT_OUTPUT_FILE, DhatProfiler};

#[cfg(feature = "dhat")]
mod heap {
    use std::path::Path;

    use super::{Profiler, ProfilerHandle};
    use crate::error::TraceResult;

    pub const DHAT_OUTPUT_FILE: &str = "dhat-heap.json";

    /// Heap profiler backed by dhat
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DhatProfiler;

    struct DhatHandle(dhat::Profiler);

    impl ProfilerHandle for DhatHandle {
        fn stop(self: Box<Self>) {
            // dhat writes its report when the profiler is dropped
            drop(self.0);
        }
    }

    impl Profiler for DhatProfiler {
        fn start(&self, output_dir: &Path) -> TraceResult<Box<dyn ProfilerHandle>> {
            let profiler = dhat::Profiler::builder()
                .file_name(output_dir.join(DHAT_OUTPUT_FILE))
                .build();
            Ok(Box::new(DhatHandle(profiler)))
        }
    }
}

/// Pick the profiler for a configured mode
pub fn profiler_for(mode: ProfilingMode) -> Arc<dyn Profiler> {
    match mode {
        ProfilingMode::Off => Arc::new(NoopProfiler),
        #[cfg(all(unix, feature = "pprof"))]
        ProfilingMode::Cpu => Arc::new(CpuProfiler),
        #[cfg(not(all(unix, feature = "pprof")))]
        ProfilingMode::Cpu => {
            tracing::warn!("CPU profiling requested but the `pprof` feature is disabled");
            Arc::new(NoopProfiler)
        }
        #[cfg(feature = "dhat")]
        ProfilingMode::Heap => Arc::new(DhatProfiler),
        #[cfg(not(feature = "dhat"))]
        ProfilingMode::Heap => {
            tracing::warn!("Heap profiling requested but the `dhat` feature is disabled");
            Arc::new(NoopProfiler)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_profiler_starts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let handle = NoopProfiler.start(dir.path()).unwrap();
        handle.stop();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_profiler_for_off() {
        let dir = tempfile::tempdir().unwrap();
        let profiler = profiler_for(ProfilingMode::Off);
        profiler.start(dir.path()).unwrap().stop();
    }

    #[cfg(not(all(unix, feature = "pprof")))]
    #[test]
    fn test_cpu_without_feature_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        profiler_for(ProfilingMode::Cpu).start(dir.path()).unwrap().stop();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(all(unix, feature = "pprof"))]
    #[test]
    fn test_cpu_profile_is_written() {
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        // pprof runs one sampler per process; other tests may hold it briefly
        let wait = Instant::now() + Duration::from_secs(10);
        let handle = loop {
            match CpuProfiler.start(dir.path()) {
                Ok(handle) => break handle,
                Err(_) if Instant::now() < wait => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => panic!("CPU profiler never became free: {e}"),
            }
        };

        let deadline = Instant::now() + Duration::from_millis(200);
        let mut acc = 0u64;
        while Instant::now() < deadline {
            acc = acc.wrapping_mul(31).wrapping_add(std::hint::black_box(7));
        }
        std::hint::black_box(acc);
        handle.stop();

        let written = std::fs::read(dir.path().join(CPU_PROFILE_FILE)).unwrap();
        assert!(!written.is_empty());
    }
}
