//! Dynamic row values exchanged with the row store.
//!
//! The content schema only carries integers, strings, and timestamps, so the
//! value enum is deliberately small. Typed entity structs (see
//! [`crate::entity`]) are built on top of these rows.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::{MigrateError, Result};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,

    /// Signed 64-bit integer (all integer columns widen to this).
    I64(i64),

    /// Double-precision float.
    F64(f64),

    /// Text data.
    Text(String),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

/// One table row as a column → value map.
///
/// Column order is not significant; `BTreeMap` keeps iteration (and the SQL
/// the adapter builds from it) deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column assignment.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Remove a column, returning its value if present.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate columns in deterministic (lexicographic) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get a required integer column.
    pub fn try_i64(&self, column: &str) -> Result<i64> {
        match self.get(column) {
            Some(Value::I64(v)) => Ok(*v),
            Some(other) => Err(MigrateError::Decode(format!(
                "column {} holds {:?}, expected an integer",
                column, other
            ))),
            None => Err(MigrateError::Decode(format!("column {} missing", column))),
        }
    }

    /// Get a required text column.
    pub fn try_str(&self, column: &str) -> Result<&str> {
        match self.get(column) {
            Some(Value::Text(s)) => Ok(s),
            Some(other) => Err(MigrateError::Decode(format!(
                "column {} holds {:?}, expected text",
                column, other
            ))),
            None => Err(MigrateError::Decode(format!("column {} missing", column))),
        }
    }

    /// Get a required timestamp column.
    pub fn try_datetime(&self, column: &str) -> Result<NaiveDateTime> {
        match self.get(column) {
            Some(Value::DateTime(dt)) => Ok(*dt),
            Some(other) => Err(MigrateError::Decode(format!(
                "column {} holds {:?}, expected a timestamp",
                column, other
            ))),
            None => Err(MigrateError::Decode(format!("column {} missing", column))),
        }
    }
}
