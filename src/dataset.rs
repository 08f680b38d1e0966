//! In-memory tabular dataset.
//!
//! A [`Dataset`] is an ordered set of named columns and an ordered list of
//! rows. It is created fresh by a load operation, mutated in place by a
//! sequence of transforms, and dropped once persisted or printed. There is
//! no caching and no identity beyond the backing table name.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::error::TransformError;

// =============================================================================
// Scalar values
// =============================================================================

/// A single cell value.
///
/// JSON representation is transparent: `null`, number, or string.
/// Booleans coming in through JSON records are folded into `Integer` (0/1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Integer number.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// Text.
    Text(String),
}

impl Value {
    /// True if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
        }
    }

    /// Stable hashable key for grouping and deduplication.
    ///
    /// Reals are keyed by bit pattern so distinct values never collide.
    pub fn group_key(&self) -> String {
        match self {
            Value::Null => "n".to_string(),
            Value::Integer(i) => format!("i:{}", i),
            Value::Real(r) => format!("r:{:x}", r.to_bits()),
            Value::Text(t) => format!("t:{}", t),
        }
    }

    /// Convert a JSON value into a cell value.
    ///
    /// Booleans become 0/1; arrays and objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Integer(*b as i64)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Integer(i))
                } else {
                    n.as_f64().map(Value::Real)
                }
            }
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert the cell value into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => json!(i),
            Value::Real(r) => json!(r),
            Value::Text(t) => json!(t),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{}", t),
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Ordered rows of named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Create an empty dataset with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows, in order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row.
    ///
    /// # Panics
    /// Panics if the row arity does not match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row arity does not match column count"
        );
        self.rows.push(row);
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column by name, or a [`TransformError::MissingColumn`].
    pub fn require_column(&self, name: &str) -> Result<usize, TransformError> {
        self.column_index(name)
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
    }

    /// Cell at (row, column name), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Append a column with one value per existing row.
    ///
    /// # Panics
    /// Panics if `values` does not have exactly one entry per row.
    pub fn add_column(&mut self, name: &str, values: Vec<Value>) {
        assert_eq!(
            values.len(),
            self.rows.len(),
            "column length does not match row count"
        );
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Map every cell of one column in place.
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
    }

    /// Convert the dataset to an array of JSON objects, one per row.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (col, value) in self.columns.iter().zip(row) {
                    obj.insert(col.clone(), value.to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }

    /// Build a dataset from an array of JSON objects.
    ///
    /// Columns are the union of keys across records; missing keys become
    /// NULL. Nested arrays/objects are rejected.
    pub fn from_records(records: &[serde_json::Value]) -> Result<Self, serde_json::Error> {
        use serde::de::Error;

        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let obj = record
                .as_object()
                .ok_or_else(|| serde_json::Error::custom("record is not a JSON object"))?;
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut dataset = Dataset::new(columns);
        for record in records {
            let obj = match record.as_object() {
                Some(obj) => obj,
                None => continue, // already rejected above
            };
            let mut row = Vec::with_capacity(dataset.columns.len());
            for col in &dataset.columns {
                let json = obj.get(col).unwrap_or(&serde_json::Value::Null);
                let value = Value::from_json(json).ok_or_else(|| {
                    serde_json::Error::custom(format!(
                        "column '{}' holds a non-scalar JSON value",
                        col
                    ))
                })?;
                row.push(value);
            }
            dataset.rows.push(row);
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let mut d = Dataset::new(vec!["ItemID".into(), "ItemName".into(), "Quantity".into()]);
        d.push_row(vec![
            Value::Integer(1),
            Value::Text("Laptop".into()),
            Value::Integer(10),
        ]);
        d.push_row(vec![Value::Integer(2), Value::Text("Mouse".into()), Value::Null]);
        d
    }

    #[test]
    fn test_column_lookup() {
        let d = sample();
        assert_eq!(d.column_index("Quantity"), Some(2));
        assert_eq!(d.column_index("Missing"), None);
        assert!(d.require_column("Missing").is_err());
    }

    #[test]
    fn test_get() {
        let d = sample();
        assert_eq!(d.get(1, "ItemName"), Some(&Value::Text("Mouse".into())));
        assert_eq!(d.get(1, "Quantity"), Some(&Value::Null));
        assert_eq!(d.get(5, "Quantity"), None);
    }

    #[test]
    fn test_records_round_trip() {
        let d = sample();
        let records = d.to_records();
        assert_eq!(records[0]["ItemName"], "Laptop");
        assert!(records[1]["Quantity"].is_null());

        let back = Dataset::from_records(&records).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_from_records_bool_and_missing_keys() {
        let records = vec![
            serde_json::json!({"a": 1, "flag": true}),
            serde_json::json!({"a": 2}),
        ];
        let d = Dataset::from_records(&records).unwrap();
        assert_eq!(d.columns(), &["a".to_string(), "flag".to_string()]);
        assert_eq!(d.get(0, "flag"), Some(&Value::Integer(1)));
        assert_eq!(d.get(1, "flag"), Some(&Value::Null));
    }

    #[test]
    fn test_group_key_distinguishes_reals() {
        assert_ne!(
            Value::Real(1.0).group_key(),
            Value::Real(1.0000000001).group_key()
        );
        assert_eq!(Value::Integer(5).group_key(), Value::Integer(5).group_key());
    }
}
