//! Query profiling: filtered caller traces and benchmark sinks.

pub mod profiler;
pub mod trace;

pub use profiler::{
    Benchmark, BenchmarkGuard, BenchmarkId, MemoryProfiler, Profiler, TracingProfiler,
};
pub use trace::{
    BacktraceStack, FixedStack, Frame, StackSource, TraceEntry, TraceRecord, capture_trace,
    clean_path,
};
