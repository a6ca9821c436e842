//! Query result types for pgxport.
//!
//! Defines the in-memory table a query is materialized into before it is
//! written out.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

use crate::error::{ExportError, Result};

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Any numeric column (integer, floating point, numeric).
    Number(f64),

    /// Boolean value.
    Bool(bool),

    /// Text, or the textual form of a type with no closer match.
    Text(String),

    /// Date or timestamp. Zoned timestamps are normalized to UTC.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value the way it appears in a cell.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => {
                if ts.time() == chrono::NaiveTime::MIN {
                    ts.format("%Y-%m-%d").to_string()
                } else {
                    ts.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
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
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Rows and column names produced by one query.
///
/// Built once and never modified. Each row holds exactly one value per
/// column, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Creates a result, checking that every row is as wide as the header.
    ///
    /// Repeated column names get a numeric suffix (`id`, `id_2`, ...) so that
    /// names stay unique.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ExportError::query(format!(
                "Row {idx} has {} values but the result has {} columns",
                row.len(),
                columns.len()
            )));
        }

        Ok(Self {
            columns: dedupe_column_names(columns),
            rows,
        })
    }

    /// Column names in projection order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in retrieval order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the query produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a value by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Returns one row as a column name → value map.
    pub fn row_map(&self, row: usize) -> Option<HashMap<&str, &Value>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter())
                .collect(),
        )
    }
}

fn dedupe_column_names(columns: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(columns.len());
    for name in columns {
        if !seen.contains(&name) {
            seen.push(name);
            continue;
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{name}_{n}");
            if !seen.contains(&candidate) {
                seen.push(candidate);
                break;
            }
            n += 1;
        }
    }
    seen
}
