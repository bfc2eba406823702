use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::row::{CustomDbRow, column_index};
use crate::error::SqlMapperError;
use crate::types::RowValues;

/// A result set from a database query
///
/// Holds the rows returned by a query together with the projected column names, which are
/// known even when no row matched.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index_cache: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Number of projected columns, zero when unknown.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_names.as_ref().map_or(0, |names| names.len())
    }

    /// Add a row to the result set
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` if column names have not been set or the value
    /// count does not match them.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) -> Result<(), SqlMapperError> {
        let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        else {
            return Err(SqlMapperError::ExecutionError(
                "No column names available".to_string(),
            ));
        };
        if column_names.len() != row_values.len() {
            return Err(SqlMapperError::ExecutionError(format!(
                "row has {} values for {} columns",
                row_values.len(),
                column_names.len()
            )));
        }

        self.results.push(CustomDbRow {
            column_names: Arc::clone(column_names),
            rows: row_values,
            column_index_cache: Arc::clone(cache),
        });
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&CustomDbRow> {
        self.results.first()
    }

    /// Deserialize every row into a typed model.
    ///
    /// # Errors
    /// Returns `SqlMapperError::RowMapping` on the first row that does not fit `T`.
    pub fn deserialize_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, SqlMapperError> {
        self.results.iter().map(CustomDbRow::deserialize).collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
