//! Scripted transport for exercising the retry controller without a server.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{ErrorCode, TransportError};
use crate::results::{CustomDbRow, ResultSet};
use crate::transport::{ErrorInfo, Transport};
use crate::types::{BackendKind, RowValues};

/// Message PDO reports when MySQL drops the connection.
pub const MYSQL_GONE_AWAY: &str = "SQLSTATE[HY000]: General error: 2006 MySQL server has gone away";

/// Disconnect failure as a MySQL driver reports it (non-numeric code).
#[must_use]
pub fn gone_away() -> TransportError {
    TransportError::new(MYSQL_GONE_AWAY, ErrorCode::State("HY000".to_string()))
}

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// Result set with `columns` and one entry per row in `rows`.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}

/// Transport replaying scripted submit outcomes.
///
/// Once the script runs dry every submission succeeds with an empty result.
#[derive(Debug)]
pub struct ScriptedTransport {
    backend: BackendKind,
    script: VecDeque<Result<ResultSet, TransportError>>,
    connect_failures: VecDeque<TransportError>,
    error_info: Option<ErrorInfo>,
    connected: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub submitted: Vec<String>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            script: VecDeque::new(),
            connect_failures: VecDeque::new(),
            error_info: None,
            connected: false,
            connects: 0,
            disconnects: 0,
            submitted: Vec::new(),
        }
    }

    #[must_use]
    pub fn then_ok(mut self, result: ResultSet) -> Self {
        self.script.push_back(Ok(result));
        self
    }

    #[must_use]
    pub fn then_err(mut self, err: TransportError) -> Self {
        self.script.push_back(Err(err));
        self
    }

    /// Queue `times` failures built by `make`.
    #[must_use]
    pub fn then_err_repeated(mut self, times: usize, make: impl Fn() -> TransportError) -> Self {
        for _ in 0..times {
            self.script.push_back(Err(make()));
        }
        self
    }

    /// Make the next `connect` call fail with `err`.
    #[must_use]
    pub fn failing_connect(mut self, err: TransportError) -> Self {
        self.connect_failures.push_back(err);
        self
    }

    /// Error info reported while connected.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    #[must_use]
    pub fn submissions(&self) -> usize {
        self.submitted.len()
    }

    /// Number of reconnects: every connect after the first.
    #[must_use]
    pub fn reconnects(&self) -> usize {
        self.connects.saturating_sub(1)
    }
}

impl Transport for ScriptedTransport {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if let Some(err) = self.connect_failures.pop_front() {
            return Err(err);
        }
        self.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn submit(&mut self, sql: &str) -> Result<ResultSet, TransportError> {
        self.submitted.push(sql.to_string());
        self.script.pop_front().unwrap_or_else(|| Ok(ResultSet::default()))
    }

    fn last_error_info(&self) -> Option<ErrorInfo> {
        if !self.connected {
            return None;
        }
        self.error_info.clone()
    }
}
