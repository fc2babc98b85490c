use std::fmt;

use rusqlite::Connection as SqliteConnectionType;

use super::query::build_result_set;
use crate::error::{ErrorCode, TransportError};
use crate::results::{ResultSet, SQLSTATE_OK};
use crate::transport::{ErrorInfo, Transport};
use crate::types::BackendKind;

/// SQLSTATE `SQLite` failures are reported under.
const SQLSTATE_GENERAL_ERROR: &str = "HY000";

/// Blocking transport over a single `rusqlite` connection.
pub struct SqliteTransport {
    db_path: String,
    conn: Option<SqliteConnectionType>,
    last_error: Option<ErrorInfo>,
}

impl SqliteTransport {
    /// Transport for `db_path`; nothing is opened until `connect`.
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn run(conn: &SqliteConnectionType, sql: &str) -> Result<ResultSet, rusqlite::Error> {
        let mut stmt = conn.prepare(sql)?;
        if stmt.column_count() > 0 {
            build_result_set(&mut stmt)
        } else {
            let changed = stmt.execute([])?;
            Ok(ResultSet::affected(u64::try_from(changed).unwrap_or(u64::MAX)))
        }
    }
}

impl Transport for SqliteTransport {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        let conn = SqliteConnectionType::open(&self.db_path).map_err(TransportError::from)?;
        self.conn = Some(conn);
        self.last_error = None;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.conn = None;
        self.last_error = None;
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn submit(&mut self, sql: &str) -> Result<ResultSet, TransportError> {
        let Some(conn) = self.conn.as_ref() else {
            return Err(TransportError::new(
                "SQLite connection is not open",
                ErrorCode::Missing,
            ));
        };
        match Self::run(conn, sql) {
            Ok(result) => {
                self.last_error = None;
                Ok(result)
            }
            Err(err) => {
                let err = TransportError::from(err);
                self.last_error = Some(ErrorInfo::new(
                    SQLSTATE_GENERAL_ERROR,
                    err.code.as_numeric(),
                    err.message.clone(),
                ));
                Err(err)
            }
        }
    }

    fn last_error_info(&self) -> Option<ErrorInfo> {
        self.conn.as_ref()?;
        Some(
            self.last_error
                .clone()
                .unwrap_or_else(|| ErrorInfo::new(SQLSTATE_OK, Some(0), "")),
        )
    }
}

impl fmt::Debug for SqliteTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransport")
            .field("db_path", &self.db_path)
            .field("connected", &self.conn.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    #[test]
    fn submit_requires_connection() {
        let mut t = SqliteTransport::in_memory();
        let err = t.submit("select 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::Missing);
        assert!(t.last_error_info().is_none());
    }

    #[test]
    fn select_and_dml_round_trip() {
        let mut t = SqliteTransport::in_memory();
        t.connect().unwrap();
        t.submit("create table t (id integer, name text)").unwrap();
        let inserted = t.submit("insert into t values (1, 'a'), (2, 'b')").unwrap();
        assert_eq!(inserted.rows_affected, 2);
        let rs = t.submit("select id, name from t order by id").unwrap();
        assert_eq!(rs.results.len(), 2);
        assert_eq!(rs.results[1].get("name"), Some(&RowValues::Text("b".into())));
        assert_eq!(t.last_error_info().unwrap().state, SQLSTATE_OK);
    }

    #[test]
    fn failures_are_recorded_in_error_info() {
        let mut t = SqliteTransport::in_memory();
        t.connect().unwrap();
        let err = t.submit("select * from missing_table").unwrap_err();
        assert_eq!(err.code, ErrorCode::Numeric(1));
        let info = t.last_error_info().unwrap();
        assert_eq!(info.state, "HY000");
        assert_eq!(info.code, Some(1));
        t.disconnect();
        assert!(!t.is_connected());
    }
}
