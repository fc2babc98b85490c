use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::result_set::ResultSet;
use super::row::CustomDbRow;
use crate::error::{DatabaseError, ErrorKind};
use crate::types::{Hydration, QueryType};

/// Insert id reported for every write; this layer never asks the driver for one.
pub const UNKNOWN_INSERT_ID: i64 = -1;

/// Row count reported for an OTHER statement whose driver state is not `"00000"`.
pub const ERROR_ROW_COUNT: i64 = -1;

/// Record tagged with the record type it was hydrated for.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord {
    pub type_name: Arc<str>,
    pub fields: JsonMap<String, JsonValue>,
}

impl TypedRecord {
    /// Convert the fields into `T`.
    ///
    /// # Errors
    /// Returns a `Hydration` error if the fields do not deserialize into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DatabaseError> {
        serde_json::from_value(JsonValue::Object(self.fields.clone())).map_err(|e| {
            DatabaseError::new(
                ErrorKind::Hydration,
                format!("cannot hydrate row into {}: {e}", self.type_name),
                0,
            )
            .with_cause(e)
        })
    }
}

/// One materialized row, shaped by the request's [`Hydration`].
#[derive(Debug, Clone)]
pub enum Record {
    Array(CustomDbRow),
    Generic(JsonMap<String, JsonValue>),
    Typed(TypedRecord),
}

impl Record {
    fn hydrate(row: CustomDbRow, hydration: &Hydration, type_name: Option<&Arc<str>>) -> Self {
        match (hydration, type_name) {
            (Hydration::AsArray, _) => Record::Array(row),
            (Hydration::AsTypedRecord(_), Some(name)) => Record::Typed(TypedRecord {
                type_name: Arc::clone(name),
                fields: row.to_json_map(),
            }),
            _ => Record::Generic(row.to_json_map()),
        }
    }

    #[must_use]
    pub fn as_row(&self) -> Option<&CustomDbRow> {
        match self {
            Record::Array(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_generic(&self) -> Option<&JsonMap<String, JsonValue>> {
        match self {
            Record::Generic(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_typed(&self) -> Option<&TypedRecord> {
        match self {
            Record::Typed(record) => Some(record),
            _ => None,
        }
    }

    /// Field value as JSON, whatever the hydration.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<JsonValue> {
        match self {
            Record::Array(row) => row.get(name).map(crate::types::RowValues::to_json),
            Record::Generic(fields) => fields.get(name).cloned(),
            Record::Typed(record) => record.fields.get(name).cloned(),
        }
    }
}

/// Fully materialized, restartable result of a READ query.
///
/// Keeps the SQL and hydration it was produced with so a cache can store it
/// and hand it back unchanged.
#[derive(Debug, Clone)]
pub struct ReadResult {
    rows: Vec<Record>,
    sql: String,
    hydration: Hydration,
    position: usize,
}

impl ReadResult {
    #[must_use]
    pub fn new(rows: Vec<Record>, sql: impl Into<String>, hydration: Hydration) -> Self {
        Self {
            rows,
            sql: sql.into(),
            hydration,
            position: 0,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn hydration(&self) -> &Hydration {
        &self.hydration
    }

    /// Number of rows, counted after materialization.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Row under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Record> {
        self.rows.get(self.position)
    }

    /// Return the row under the cursor and move past it.
    pub fn next_row(&mut self) -> Option<&Record> {
        let row = self.rows.get(self.position)?;
        self.position += 1;
        Some(row)
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Every row as a column -> value map, in row order.
    ///
    /// # Returns
    ///
    /// One JSON object per row, whatever hydration produced the rows.
    #[must_use]
    pub fn as_array(&self) -> Vec<JsonMap<String, JsonValue>> {
        self.rows
            .iter()
            .map(|record| match record {
                Record::Array(row) => row.to_json_map(),
                Record::Generic(fields) => fields.clone(),
                Record::Typed(record) => record.fields.clone(),
            })
            .collect()
    }

    /// Deserialize every row into `T`.
    ///
    /// # Errors
    /// Returns a `Hydration` error if the result was not hydrated for `T`, or
    /// if any row fails to deserialize.
    pub fn typed_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, DatabaseError> {
        let wanted = std::any::type_name::<T>();
        match &self.hydration {
            Hydration::AsTypedRecord(name) if name == wanted => {}
            other => {
                return Err(DatabaseError::new(
                    ErrorKind::Hydration,
                    format!(
                        "result of \"{}\" was hydrated as {other:?}, not {wanted}",
                        self.sql
                    ),
                    0,
                ));
            }
        }
        self.rows
            .iter()
            .filter_map(Record::as_typed)
            .map(|record| record.deserialize::<T>())
            .collect()
    }
}

impl<'a> IntoIterator for &'a ReadResult {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Shape of a successful execution, picked solely by [`QueryType`].
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Read {
        rows: ReadResult,
        row_count_hint: usize,
    },
    Write {
        insert_id: i64,
        affected_rows: i64,
    },
    Generic {
        affected_rows: i64,
    },
}

impl QueryOutcome {
    #[must_use]
    pub fn as_read(&self) -> Option<&ReadResult> {
        match self {
            QueryOutcome::Read { rows, .. } => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_read(self) -> Option<ReadResult> {
        match self {
            QueryOutcome::Read { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// Affected row count for write and generic outcomes.
    #[must_use]
    pub fn affected_rows(&self) -> Option<i64> {
        match self {
            QueryOutcome::Read { .. } => None,
            QueryOutcome::Write { affected_rows, .. } | QueryOutcome::Generic { affected_rows } => {
                Some(*affected_rows)
            }
        }
    }
}

/// Reshape a raw driver result according to the query type and hydration.
#[must_use]
pub fn normalize(
    query_type: QueryType,
    hydration: &Hydration,
    sql: &str,
    raw: ResultSet,
) -> QueryOutcome {
    match query_type {
        QueryType::Read => {
            let type_name: Option<Arc<str>> = match hydration {
                Hydration::AsTypedRecord(name) => Some(Arc::from(name.as_str())),
                _ => None,
            };
            let rows: Vec<Record> = raw
                .results
                .into_iter()
                .map(|row| Record::hydrate(row, hydration, type_name.as_ref()))
                .collect();
            let row_count_hint = rows.len();
            QueryOutcome::Read {
                rows: ReadResult::new(rows, sql, hydration.clone()),
                row_count_hint,
            }
        }
        QueryType::Write => QueryOutcome::Write {
            insert_id: UNKNOWN_INSERT_ID,
            affected_rows: clamp_count(raw.rows_affected),
        },
        QueryType::Other => QueryOutcome::Generic {
            affected_rows: if raw.is_ok_state() {
                clamp_count(raw.rows_affected)
            } else {
                ERROR_ROW_COUNT
            },
        },
    }
}

fn clamp_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
