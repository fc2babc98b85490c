//! Convenient imports for common functionality.

pub use crate::classify::{Classifier, DisconnectRule, Verdict};
pub use crate::config::{
    ConfigSource, ConnectionOptions, ConnectionOptionsBuilder, EmptyConfig, JsonConfig,
};
pub use crate::connection::Connection;
pub use crate::error::{DatabaseError, ErrorCode, ErrorKind, TransportError};
pub use crate::profiling::{MemoryProfiler, Profiler, TracingProfiler};
pub use crate::results::{CustomDbRow, QueryOutcome, ReadResult, Record, ResultSet, TypedRecord};
pub use crate::transport::{ErrorInfo, Transport};
pub use crate::types::{BackendKind, Hydration, QueryRequest, QueryType, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteTransport;
