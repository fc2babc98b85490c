use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::types::RowValues;

/// SQLSTATE reported by a statement that completed without error.
pub const SQLSTATE_OK: &str = "00000";

/// Raw result handed back by a transport for one submitted statement.
///
/// Rows are already pulled off the wire; `rows_affected` is whatever the
/// driver reports and is not trusted as a row count for SELECTs.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// The rows returned by the statement
    pub results: Vec<CustomDbRow>,
    /// Row count reported by the driver (changes for DML)
    pub rows_affected: u64,
    /// SQLSTATE of the statement; `"00000"` means success
    pub error_state: String,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            rows_affected: 0,
            error_state: SQLSTATE_OK.to_string(),
            column_names: None,
            column_index: None,
        }
    }
}

impl ResultSet {
    /// Create a new result set with a known capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - The initial capacity for the result rows
    ///
    /// # Returns
    ///
    /// A new `ResultSet` instance with preallocated capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Result of a statement that returns no rows.
    ///
    /// # Arguments
    ///
    /// * `rows_affected` - Row count reported by the driver
    #[must_use]
    pub fn affected(rows_affected: u64) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    #[must_use]
    pub fn with_error_state(mut self, state: impl Into<String>) -> Self {
        self.error_state = state.into();
        self
    }

    /// Set the column names for this result set (to be shared by all rows)
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names, in column order
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(build_column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set
    ///
    /// Rows added before column names are set are dropped.
    ///
    /// # Arguments
    ///
    /// * `row_values` - The values for this row
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow::with_index(
                Arc::clone(names),
                Arc::clone(index),
                row_values,
            ));
            self.rows_affected += 1;
        }
    }

    /// Whether the driver reported the canonical "no error" state.
    #[must_use]
    pub fn is_ok_state(&self) -> bool {
        self.error_state == SQLSTATE_OK
    }
}
