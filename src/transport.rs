//! Connection transport seam.
//!
//! A transport owns one native database handle. It is blocking and is never
//! shared between callers; [`Connection`](crate::connection::Connection)
//! drives it one statement at a time.

use crate::error::TransportError;
use crate::results::ResultSet;
use crate::types::BackendKind;

/// Last error reported by the native handle: `(state, code, message)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub state: String,
    pub code: Option<i64>,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(state: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            code,
            message: message.into(),
        }
    }
}

/// Native connection driven by the retry controller.
pub trait Transport {
    /// Backend behind this transport; selects the disconnect rule.
    fn backend(&self) -> BackendKind;

    /// Open the native handle.
    ///
    /// # Errors
    /// Returns `TransportError` if the handle cannot be opened.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Drop the native handle. Safe to call when already disconnected.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Run one statement and pull its rows.
    ///
    /// # Errors
    /// Returns `TransportError` if the statement fails or the handle is gone.
    fn submit(&mut self, sql: &str) -> Result<ResultSet, TransportError>;

    /// Error info of the live handle, `None` when disconnected.
    fn last_error_info(&self) -> Option<ErrorInfo>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn submit(&mut self, sql: &str) -> Result<ResultSet, TransportError> {
        (**self).submit(sql)
    }

    fn last_error_info(&self) -> Option<ErrorInfo> {
        (**self).last_error_info()
    }
}
