//! Execute-with-retry-and-reshape.
//!
//! [`Connection::execute`] submits one statement on the owned transport,
//! reconnects and resubmits when the server dropped the connection, turns
//! every other failure into a [`DatabaseError`], and reshapes the raw result
//! by query type.

use std::sync::Arc;

use crate::classify::{Classifier, Verdict};
use crate::config::{
    ConfigSource, ConnectionOptions, EmptyConfig, profiling_path_aliases, profiling_paths,
};
use crate::error::{DatabaseError, ErrorKind, TransportError};
use crate::profiling::{
    BacktraceStack, BenchmarkGuard, Profiler, StackSource, TracingProfiler, capture_trace,
};
use crate::results::{QueryOutcome, ResultSet, normalize};
use crate::transport::Transport;
use crate::types::{Hydration, QueryRequest, QueryType};

/// Trace settings read once per execution.
struct TraceSettings {
    profiler: Arc<dyn Profiler>,
    filters: Vec<String>,
    aliases: Vec<(String, String)>,
}

/// One logical database connection.
///
/// Not shareable between concurrent callers: `execute` takes `&mut self` and
/// runs attempts strictly one after another on the calling thread.
pub struct Connection<T: Transport> {
    transport: T,
    options: ConnectionOptions,
    classifier: Classifier,
    config: Arc<dyn ConfigSource + Send + Sync>,
    profiler: Option<Arc<dyn Profiler>>,
    stack: Arc<dyn StackSource>,
    last_query: Option<String>,
}

impl<T: Transport> Connection<T> {
    /// Wrap `transport` with `options`.
    ///
    /// Disconnects are classified for `options.backend`. With
    /// `options.profiling` set, benchmarks go to a [`TracingProfiler`] until
    /// [`with_profiler`](Self::with_profiler) installs another sink.
    #[must_use]
    pub fn new(transport: T, options: ConnectionOptions) -> Self {
        if transport.backend() != options.backend {
            tracing::warn!(
                instance = %options.instance,
                configured = ?options.backend,
                transport = ?transport.backend(),
                "transport backend differs from configured backend"
            );
        }
        let profiler = options
            .profiling
            .then(|| Arc::new(TracingProfiler::new()) as Arc<dyn Profiler>);
        Self {
            transport,
            options,
            classifier: Classifier::default(),
            config: Arc::new(EmptyConfig),
            profiler,
            stack: Arc::new(BacktraceStack),
            last_query: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Arc<dyn ConfigSource + Send + Sync>) -> Self {
        self.config = config;
        self
    }

    /// Profiler receiving benchmarks in place of the default
    /// [`TracingProfiler`]; only used when `options.profiling` is set.
    #[must_use]
    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    #[must_use]
    pub fn with_stack_source(mut self, stack: Arc<dyn StackSource>) -> Self {
        self.stack = stack;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// SQL of the last successful execution.
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Open the transport if it is not already open.
    ///
    /// # Errors
    /// Returns a `Connect` error if the transport cannot be opened.
    pub fn connect(&mut self) -> Result<(), DatabaseError> {
        if self.transport.is_connected() {
            return Ok(());
        }
        self.transport
            .connect()
            .map_err(|err| self.connect_error(err, None))
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Shorthand for [`execute`](Self::execute) with an inline request.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub fn query(
        &mut self,
        query_type: QueryType,
        sql: &str,
        hydration: Hydration,
    ) -> Result<QueryOutcome, DatabaseError> {
        self.execute(&QueryRequest::new(query_type, sql, hydration))
    }

    /// Run `request`, reconnecting on a dropped connection.
    ///
    /// A disconnect is retried up to `options.max_reconnects` times; any other
    /// failure is returned after the first submission. The error message
    /// carries the SQL text.
    ///
    /// # Errors
    /// Returns `DatabaseError` with kind `Terminal`, `AttemptsExhausted`,
    /// `Connect` or `Config`.
    pub fn execute(&mut self, request: &QueryRequest) -> Result<QueryOutcome, DatabaseError> {
        let sql = request.sql.as_str();
        if sql.trim().is_empty() {
            return Err(DatabaseError::new(ErrorKind::Terminal, "cannot execute an empty query", 0));
        }

        let tracing_settings = self.trace_settings()?;
        let mut remaining = self.options.max_reconnects;
        let mut attempt = 1u32;

        let raw: ResultSet = loop {
            if !self.transport.is_connected() {
                self.transport
                    .connect()
                    .map_err(|err| self.connect_error(err, Some(sql)))?;
            }

            let benchmark = tracing_settings
                .as_ref()
                .map(|settings| self.open_benchmark(settings, sql));

            tracing::debug!(instance = %self.options.instance, attempt, sql, "submitting query");
            let err = match self.transport.submit(sql) {
                Ok(raw) => {
                    if let Some(benchmark) = benchmark {
                        benchmark.finish();
                    }
                    break raw;
                }
                Err(err) => err,
            };
            drop(benchmark);

            let verdict = self.classifier.classify(self.options.backend, &err);
            if verdict == Verdict::Transient && remaining > 0 {
                tracing::warn!(
                    instance = %self.options.instance,
                    attempt,
                    remaining,
                    error = %err,
                    "connection lost, reconnecting"
                );
                self.reconnect(sql)?;
                remaining -= 1;
                attempt += 1;
                continue;
            }

            let kind = match verdict {
                Verdict::Transient => ErrorKind::AttemptsExhausted,
                Verdict::Terminal => ErrorKind::Terminal,
            };
            let fallback = self.fallback_code();
            let normalized = DatabaseError::from_transport(kind, err, sql, fallback);
            tracing::error!(
                instance = %self.options.instance,
                attempt,
                code = normalized.code,
                kind = ?kind,
                "query failed"
            );
            return Err(normalized);
        };

        self.last_query = Some(sql.to_string());

        let outcome = normalize(request.query_type, &request.hydration, sql, raw);
        if let QueryOutcome::Write { affected_rows, .. } = &outcome {
            tracing::info!(instance = %self.options.instance, affected_rows, "insert end");
        }
        Ok(outcome)
    }

    fn trace_settings(&self) -> Result<Option<TraceSettings>, DatabaseError> {
        let Some(profiler) = self.profiler.as_ref().filter(|_| self.options.profiling) else {
            return Ok(None);
        };
        Ok(Some(TraceSettings {
            profiler: Arc::clone(profiler),
            filters: profiling_paths(self.config.as_ref())?,
            aliases: profiling_path_aliases(self.config.as_ref())?,
        }))
    }

    fn open_benchmark(&self, settings: &TraceSettings, sql: &str) -> BenchmarkGuard {
        let trace = capture_trace(self.stack.frames(), &settings.filters, &settings.aliases);
        BenchmarkGuard::start(
            Arc::clone(&settings.profiler),
            &self.options.instance,
            sql,
            trace,
        )
    }

    fn reconnect(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.transport.disconnect();
        self.transport
            .connect()
            .map_err(|err| self.connect_error(err, Some(sql)))
    }

    /// Code used when a failure carries no integer code of its own.
    fn fallback_code(&self) -> Option<i64> {
        if !self.transport.is_connected() {
            return None;
        }
        self.transport.last_error_info().and_then(|info| info.code)
    }

    fn connect_error(&self, err: TransportError, sql: Option<&str>) -> DatabaseError {
        let fallback = self.fallback_code();
        match sql {
            Some(sql) => DatabaseError::from_transport(ErrorKind::Connect, err, sql, fallback),
            None => {
                let code = err.code.as_numeric().or(fallback).unwrap_or(0);
                DatabaseError::new(ErrorKind::Connect, err.message.clone(), code).with_cause(err)
            }
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("options", &self.options)
            .field("classifier", &self.classifier)
            .field("profiling", &self.profiler.is_some())
            .field("last_query", &self.last_query)
            .finish()
    }
}
