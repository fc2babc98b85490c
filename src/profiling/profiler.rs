use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::trace::TraceRecord;

/// Handle of an open benchmark.
pub type BenchmarkId = u64;

/// Sink for query benchmarks.
///
/// Every `start` is followed by exactly one `stop` or `delete` for its id.
pub trait Profiler: Send + Sync {
    fn start(&self, identity: &str, sql: &str, trace: TraceRecord) -> BenchmarkId;
    fn stop(&self, id: BenchmarkId);
    fn delete(&self, id: BenchmarkId);
}

/// Open benchmark for one attempt; deleted on drop unless finished.
pub struct BenchmarkGuard {
    profiler: Arc<dyn Profiler>,
    id: Option<BenchmarkId>,
}

impl BenchmarkGuard {
    pub fn start(
        profiler: Arc<dyn Profiler>,
        identity: &str,
        sql: &str,
        trace: TraceRecord,
    ) -> Self {
        let id = profiler.start(identity, sql, trace);
        Self {
            profiler,
            id: Some(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<BenchmarkId> {
        self.id
    }

    /// Stop the benchmark, recording it.
    pub fn finish(mut self) {
        if let Some(id) = self.id.take() {
            self.profiler.stop(id);
        }
    }
}

impl Drop for BenchmarkGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.profiler.delete(id);
        }
    }
}

impl std::fmt::Debug for BenchmarkGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkGuard").field("id", &self.id).finish()
    }
}

/// A stopped benchmark.
#[derive(Debug, Clone)]
pub struct Benchmark {
    pub identity: String,
    pub sql: String,
    pub trace: TraceRecord,
    pub elapsed: Duration,
}

#[derive(Debug)]
struct OpenBenchmark {
    identity: String,
    sql: String,
    trace: TraceRecord,
    started: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: BenchmarkId,
    open: HashMap<BenchmarkId, OpenBenchmark>,
    finished: Vec<Benchmark>,
    deleted: usize,
}

/// Profiler keeping benchmarks in memory.
#[derive(Debug, Default)]
pub struct MemoryProfiler {
    state: Mutex<MemoryState>,
}

impl MemoryProfiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stopped benchmarks, oldest first.
    #[must_use]
    pub fn finished(&self) -> Vec<Benchmark> {
        self.lock().finished.clone()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().open.len()
    }

    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.lock().deleted
    }
}

impl Profiler for MemoryProfiler {
    fn start(&self, identity: &str, sql: &str, trace: TraceRecord) -> BenchmarkId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.open.insert(
            id,
            OpenBenchmark {
                identity: identity.to_string(),
                sql: sql.to_string(),
                trace,
                started: Instant::now(),
            },
        );
        id
    }

    fn stop(&self, id: BenchmarkId) {
        let mut state = self.lock();
        if let Some(open) = state.open.remove(&id) {
            state.finished.push(Benchmark {
                identity: open.identity,
                sql: open.sql,
                trace: open.trace,
                elapsed: open.started.elapsed(),
            });
        }
    }

    fn delete(&self, id: BenchmarkId) {
        let mut state = self.lock();
        if state.open.remove(&id).is_some() {
            state.deleted += 1;
        }
    }
}

/// Profiler that reports stopped benchmarks as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingProfiler {
    next_id: AtomicU64,
    open: Mutex<HashMap<BenchmarkId, OpenBenchmark>>,
}

impl TracingProfiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> MutexGuard<'_, HashMap<BenchmarkId, OpenBenchmark>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Profiler for TracingProfiler {
    fn start(&self, identity: &str, sql: &str, trace: TraceRecord) -> BenchmarkId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.open().insert(
            id,
            OpenBenchmark {
                identity: identity.to_string(),
                sql: sql.to_string(),
                trace,
                started: Instant::now(),
            },
        );
        id
    }

    fn stop(&self, id: BenchmarkId) {
        let Some(open) = self.open().remove(&id) else {
            return;
        };
        let trace = serde_json::to_string(&open.trace).unwrap_or_default();
        let elapsed_us = u64::try_from(open.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::debug!(
            instance = %open.identity,
            sql = %open.sql,
            elapsed_us,
            trace = %trace,
            "query benchmark"
        );
    }

    fn delete(&self, id: BenchmarkId) {
        self.open().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::trace::TraceEntry;

    #[test]
    fn guard_deletes_on_drop() {
        let profiler = Arc::new(MemoryProfiler::new());
        {
            let guard = BenchmarkGuard::start(profiler.clone(), "default", "select 1", Vec::new());
            assert!(guard.id().is_some());
            assert_eq!(profiler.open_count(), 1);
        }
        assert_eq!(profiler.open_count(), 0);
        assert_eq!(profiler.deleted_count(), 1);
        assert!(profiler.finished().is_empty());
    }

    #[test]
    fn guard_finish_stops_once() {
        let profiler = Arc::new(MemoryProfiler::new());
        let trace = vec![TraceEntry {
            file: "/app/src/x.rs".into(),
            line: 4,
        }];
        BenchmarkGuard::start(profiler.clone(), "default", "select 1", trace.clone()).finish();
        let finished = profiler.finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].trace, trace);
        assert_eq!(profiler.deleted_count(), 0);
    }

    #[test]
    fn tracing_profiler_forgets_deleted_benchmarks() {
        let profiler = TracingProfiler::new();
        let a = profiler.start("default", "select 1", Vec::new());
        let b = profiler.start("default", "select 2", Vec::new());
        assert_ne!(a, b);
        profiler.delete(a);
        profiler.stop(b);
        assert!(profiler.open().is_empty());
    }
}
