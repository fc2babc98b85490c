use std::fmt;

use thiserror::Error;

/// Boxed error carried as the cause of a [`DatabaseError`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Native error code reported by a transport failure.
///
/// Drivers do not agree on what a "code" is: MySQL and `SQLite` report integers,
/// others only report an SQLSTATE string, and some report nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// Integer driver code (e.g. MySQL `2006`, `SQLite` extended result code)
    Numeric(i64),
    /// Non-numeric code such as an SQLSTATE (`"HY000"`)
    State(String),
    /// The driver did not report a code
    Missing,
}

impl ErrorCode {
    /// The integer code, if the driver reported one.
    #[must_use]
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            ErrorCode::Numeric(code) => Some(*code),
            ErrorCode::State(state) => state.parse().ok(),
            ErrorCode::Missing => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Numeric(code) => write!(f, "{code}"),
            ErrorCode::State(state) => f.write_str(state),
            ErrorCode::Missing => f.write_str("<none>"),
        }
    }
}

/// Low-level failure raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub code: ErrorCode,
    #[source]
    pub source: Option<BoxedCause>,
}

impl TransportError {
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedCause>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Which branch of the failure taxonomy produced a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed SQL, constraint violation, permission denial, ...; never retried
    Terminal,
    /// A disconnect that persisted across every reconnect attempt
    AttemptsExhausted,
    /// Opening or re-opening the connection failed
    Connect,
    /// A materialized row could not be converted into the requested record type
    Hydration,
    /// A configuration value had the wrong shape
    Config,
}

/// The single error type surfaced to callers.
///
/// The message always carries the offending SQL (when there is one) so the
/// failure can be diagnosed from the error alone.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
    pub code: i64,
    pub kind: ErrorKind,
    #[source]
    pub cause: Option<BoxedCause>,
}

impl DatabaseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
            kind,
            cause: None,
        }
    }

    /// Normalize a transport failure raised while running `sql`.
    ///
    /// `fallback_code` is consulted only when the failure itself carries no
    /// integer code; it is the connection's last error-info code, or `None`
    /// when there is no live connection (which yields `0`).
    #[must_use]
    pub fn from_transport(
        kind: ErrorKind,
        err: TransportError,
        sql: &str,
        fallback_code: Option<i64>,
    ) -> Self {
        let code = err.code.as_numeric().or(fallback_code).unwrap_or(0);
        Self {
            message: format!("{} with query: \"{sql}\"", err.message),
            code,
            kind,
            cause: Some(Box::new(err)),
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<BoxedCause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The underlying transport failure, when this error wraps one.
    #[must_use]
    pub fn transport_error(&self) -> Option<&TransportError> {
        self.cause
            .as_deref()
            .and_then(|cause| cause.downcast_ref::<TransportError>())
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.kind == ErrorKind::AttemptsExhausted
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TransportError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(ffi, _) => {
                ErrorCode::Numeric(i64::from(ffi.extended_code))
            }
            _ => ErrorCode::State("HY000".to_string()),
        };
        TransportError::new(err.to_string(), code).with_source(err)
    }
}
