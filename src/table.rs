//! Conversion of step data tables into property maps.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised when a data table has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A row does not have exactly two cells.
    #[error("table row {row} must have a key and a value, found {cells} cell(s)")]
    MalformedRow {
        /// Zero-based row index.
        row: usize,
        /// Number of cells found.
        cells: usize,
    },
}

/// Read a two-column `| key | value |` table into an ordered map.
///
/// Values stay strings. Later rows overwrite earlier rows with the same key.
///
/// # Errors
///
/// Returns [`TableError::MalformedRow`] when a row does not have two cells.
pub fn key_values(rows: &[Vec<String>]) -> Result<Map<String, Value>, TableError> {
    let mut map = Map::new();
    for (row, cells) in rows.iter().enumerate() {
        let [key, value] = cells.as_slice() else {
            return Err(TableError::MalformedRow {
                row,
                cells: cells.len(),
            });
        };
        map.insert(key.trim().to_owned(), Value::String(value.clone()));
    }
    Ok(map)
}

/// Overlay `values` on top of `defaults`, keeping default key order.
#[must_use]
pub fn merge(defaults: &Map<String, Value>, values: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in values {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn reads_key_value_rows() {
        let rows = vec![row(&["title", "Hello"]), row(&["count", "3"])];
        let map = key_values(&rows).map(Value::Object);
        assert_eq!(map, Ok(json!({"title": "Hello", "count": "3"})));
    }

    #[test]
    fn empty_table_is_empty_map() {
        assert_eq!(key_values(&[]).map(|m| m.len()), Ok(0));
    }

    #[test]
    fn rejects_wrong_width() {
        let rows = vec![row(&["title", "Hello"]), row(&["lonely"])];
        assert_eq!(
            key_values(&rows),
            Err(TableError::MalformedRow { row: 1, cells: 1 })
        );
    }

    #[test]
    fn merge_overrides_defaults() {
        let defaults = json!({"a": 1, "b": 2});
        let values = json!({"b": 3, "c": 4});
        let merged = merge(
            defaults.as_object().unwrap_or(&Map::new()),
            values.as_object().unwrap_or(&Map::new()),
        );
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 3, "c": 4}));
    }
}
