use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row.
///
/// Every transport converts its native column values into this enum so the
/// result normalizer never branches on driver types:
/// ```rust
/// use sql_resilient::prelude::*;
///
/// let row = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// # let _ = row;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// JSON form used for generic and typed records.
    ///
    /// Timestamps become `"YYYY-MM-DD HH:MM:SS[.fff]"` strings and blobs become
    /// arrays of bytes; non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(value) => value.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }
}

/// Database backend behind a transport.
///
/// Used to pick the disconnect classification rule; config values are the
/// lowercase names (`mysql`, `postgres`, `sqlite`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// MySQL / `MariaDB`
    Mysql,
    /// `PostgreSQL`
    Postgres,
    /// `SQLite`
    Sqlite,
}

/// What kind of statement a request carries; picks the result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// SELECT and anything else that returns rows
    Read,
    /// INSERT
    Write,
    /// UPDATE, DELETE, DDL and administrative statements
    Other,
}

/// How each row of a read result is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hydration {
    /// Column name to value mapping, in column order
    AsArray,
    /// Field-named anonymous record
    AsGenericRecord,
    /// Record tagged with a named type, convertible with `ReadResult::typed_rows`
    AsTypedRecord(String),
}

impl Hydration {
    /// Typed hydration named after `T`.
    #[must_use]
    pub fn typed<T>() -> Self {
        Hydration::AsTypedRecord(std::any::type_name::<T>().to_string())
    }
}

/// A logical query: type tag, SQL text and hydration directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query_type: QueryType,
    pub sql: String,
    pub hydration: Hydration,
}

impl QueryRequest {
    pub fn new(query_type: QueryType, sql: impl Into<String>, hydration: Hydration) -> Self {
        Self {
            query_type,
            sql: sql.into(),
            hydration,
        }
    }

    /// Read request hydrated as column maps.
    pub fn read(sql: impl Into<String>) -> Self {
        Self::new(QueryType::Read, sql, Hydration::AsArray)
    }

    /// Read request hydrated as `T`-tagged records.
    pub fn read_as<T>(sql: impl Into<String>) -> Self {
        Self::new(QueryType::Read, sql, Hydration::typed::<T>())
    }

    pub fn write(sql: impl Into<String>) -> Self {
        Self::new(QueryType::Write, sql, Hydration::AsArray)
    }

    pub fn other(sql: impl Into<String>) -> Self {
        Self::new(QueryType::Other, sql, Hydration::AsArray)
    }

    #[must_use]
    pub fn with_hydration(mut self, hydration: Hydration) -> Self {
        self.hydration = hydration;
        self
    }
}
