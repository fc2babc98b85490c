// SQLite transport
//
// - query: result extraction and building
// - transport: the blocking `Transport` implementation

pub mod query;
pub mod transport;

pub use query::{DeclaredKind, build_result_set};
pub use transport::SqliteTransport;
