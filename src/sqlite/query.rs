use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::Statement;
use rusqlite::types::Value;

use crate::results::ResultSet;
use crate::types::RowValues;

/// Value shape a column's declared type asks for.
///
/// `SQLite` stores timestamps as text, booleans as integers and JSON as text;
/// the declared type is the only hint that they are anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    Plain,
    Timestamp,
    Bool,
    Json,
}

impl DeclaredKind {
    /// Pick the value shape for a declared column type.
    ///
    /// # Arguments
    ///
    /// * `decl_type` - Declared type of the column; `None` for expressions
    ///
    /// # Returns
    ///
    /// `Plain` unless the type names a timestamp, boolean or JSON column
    #[must_use]
    pub fn from_decl_type(decl_type: Option<&str>) -> Self {
        let Some(decl) = decl_type else {
            return Self::Plain;
        };
        let decl = decl.trim().to_ascii_uppercase();
        if decl.starts_with("BOOL") {
            Self::Bool
        } else if decl.contains("DATETIME") || decl.contains("TIMESTAMP") {
            Self::Timestamp
        } else if decl.starts_with("JSON") {
            Self::Json
        } else {
            Self::Plain
        }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%F %T%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%F %T"))
        .ok()
}

/// Extract a `RowValues` from a `SQLite` row.
///
/// Values that do not fit the declared shape (a `2` in a boolean column,
/// unparseable timestamp text) are returned as stored.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
    kind: DeclaredKind,
) -> Result<RowValues, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match (value, kind) {
        (Value::Null, _) => RowValues::Null,
        (Value::Integer(i @ (0 | 1)), DeclaredKind::Bool) => RowValues::Bool(i == 1),
        (Value::Integer(i), _) => RowValues::Int(i),
        (Value::Real(f), _) => RowValues::Float(f),
        (Value::Text(s), DeclaredKind::Timestamp) => match parse_timestamp(&s) {
            Some(ts) => RowValues::Timestamp(ts),
            None => RowValues::Text(s),
        },
        (Value::Text(s), DeclaredKind::Json) => match serde_json::from_str(&s) {
            Ok(json) => RowValues::JSON(json),
            Err(_) => RowValues::Text(s),
        },
        (Value::Text(s), _) => RowValues::Text(s),
        (Value::Blob(b), _) => RowValues::Blob(b),
    })
}

/// Run a row-returning statement and pull every row.
///
/// # Errors
/// Returns `rusqlite::Error` if execution or row extraction fails.
pub fn build_result_set(stmt: &mut Statement) -> Result<ResultSet, rusqlite::Error> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let kinds: Vec<DeclaredKind> = stmt
        .columns()
        .iter()
        .map(|column| DeclaredKind::from_decl_type(column.decl_type()))
        .collect();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows_iter = stmt.query([])?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            row_values.push(sqlite_extract_value_sync(row, i, *kind)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_pick_value_shape() {
        assert_eq!(DeclaredKind::from_decl_type(None), DeclaredKind::Plain);
        assert_eq!(DeclaredKind::from_decl_type(Some("TEXT")), DeclaredKind::Plain);
        assert_eq!(DeclaredKind::from_decl_type(Some("boolean")), DeclaredKind::Bool);
        assert_eq!(DeclaredKind::from_decl_type(Some("DATETIME")), DeclaredKind::Timestamp);
        assert_eq!(DeclaredKind::from_decl_type(Some("timestamp")), DeclaredKind::Timestamp);
        assert_eq!(DeclaredKind::from_decl_type(Some("JSON")), DeclaredKind::Json);
    }

    #[test]
    fn declared_columns_are_converted() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ev (at DATETIME, done BOOLEAN, meta JSON, note TEXT);
             INSERT INTO ev VALUES ('2024-01-01 08:00:01', 1, '{\"k\": [1, 2]}', 'x');
             INSERT INTO ev VALUES ('not a date', 2, 'not json', NULL);",
        )
        .unwrap();
        let mut stmt = conn.prepare("SELECT at, done, meta, note FROM ev ORDER BY rowid").unwrap();

        let rs = build_result_set(&mut stmt).unwrap();

        let first = &rs.results[0];
        let expected = parse_timestamp("2024-01-01 08:00:01").unwrap();
        assert_eq!(first.get("at"), Some(&RowValues::Timestamp(expected)));
        assert_eq!(first.get("done"), Some(&RowValues::Bool(true)));
        assert_eq!(
            first.get("meta"),
            Some(&RowValues::JSON(serde_json::json!({"k": [1, 2]})))
        );
        assert_eq!(first.get("note"), Some(&RowValues::Text("x".into())));

        let second = &rs.results[1];
        assert_eq!(second.get("at"), Some(&RowValues::Text("not a date".into())));
        assert_eq!(second.get("done"), Some(&RowValues::Int(2)));
        assert_eq!(second.get("meta"), Some(&RowValues::Text("not json".into())));
        assert_eq!(second.get("note"), Some(&RowValues::Null));
    }
}
