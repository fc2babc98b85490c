//! Resilient query execution over a single blocking database connection.
//!
//! A [`Connection`] owns one [`Transport`], submits a [`QueryRequest`],
//! transparently reconnects when the server dropped the connection, and
//! reshapes the raw result into a [`QueryOutcome`]:
//! ```rust
//! # #[cfg(feature = "sqlite")]
//! # fn demo() -> Result<(), sql_resilient::DatabaseError> {
//! use sql_resilient::prelude::*;
//!
//! let options = ConnectionOptionsBuilder::new("default", BackendKind::Sqlite).finish();
//! let mut conn = Connection::new(SqliteTransport::in_memory(), options);
//! conn.execute(&QueryRequest::other("CREATE TABLE t (id INTEGER)"))?;
//! conn.execute(&QueryRequest::write("INSERT INTO t VALUES (1)"))?;
//! let rows = conn.execute(&QueryRequest::read("SELECT id FROM t"))?;
//! assert_eq!(rows.as_read().map(ReadResult::len), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod prelude;
pub mod profiling;
pub mod results;
pub mod transport;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use classify::{Classifier, DisconnectRule, Verdict};
pub use connection::Connection;
pub use error::{DatabaseError, ErrorCode, ErrorKind, TransportError};
pub use results::{QueryOutcome, ReadResult, Record};
pub use transport::{ErrorInfo, Transport};
pub use types::{BackendKind, Hydration, QueryRequest, QueryType, RowValues};
