use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::attributes::names_match;
use crate::error::{AuditError, Result};

/// Tokens treated as a missing cell, compared case-insensitively.
const MISSING_TOKENS: [&str; 6] = ["", "na", "n/a", "nan", "null", "none"];

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Coerce a raw text cell: numeric strings become numbers, empty and
    /// NA-like tokens become missing, everything else is kept as text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS
            .iter()
            .any(|token| trimmed.eq_ignore_ascii_case(token))
        {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Value::Number(number),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(flag) => Value::Text(flag.to_string()),
            serde_json::Value::Number(number) => number
                .as_f64()
                .filter(|number| number.is_finite())
                .map(Value::Number)
                .unwrap_or(Value::Missing),
            serde_json::Value::String(text) => Value::parse(text),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing => serde_json::Value::Null,
            Value::Number(number) => serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(text) => serde_json::Value::String(text.clone()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Canonical category key. Integral numbers drop their fraction so that
    /// `1`, `1.0` and `"1.0"` all land in the same group.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Number(number) => Some(format_number(*number)),
            Value::Text(text) => Some(text.clone()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Missing => serializer.serialize_none(),
            Value::Number(number) => serializer.serialize_f64(*number),
            Value::Text(text) => serializer.serialize_str(text),
        }
    }
}

pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Orders category keys numerically when both parse as numbers, otherwise
/// lexically.
pub fn compare_keys(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// A named column of cells. `raw` keeps each cell's source text so that
/// exports reproduce identifiers such as `00123` byte for byte.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
    pub raw: Vec<String>,
}

impl Column {
    pub fn raw_text(&self, row: usize) -> &str {
        &self.raw[row]
    }
}

/// Immutable column-oriented table built once per audit.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
    lookup: HashMap<String, usize>,
}

impl Dataset {
    /// Build a dataset from column names and row-major records. Every record
    /// must carry exactly one value per header column. The source text of a
    /// cell is its canonical key, or empty when missing.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let cells = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|value| {
                        let raw = value.key().unwrap_or_default();
                        (value, raw)
                    })
                    .collect()
            })
            .collect();
        Self::from_cells(header, cells)
    }

    /// Build a dataset from text records, coercing each cell with
    /// [`Value::parse`] and keeping the text as written.
    pub fn from_text_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let cells = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|raw| (Value::parse(&raw), raw))
                    .collect()
            })
            .collect();
        Self::from_cells(header, cells)
    }

    pub(crate) fn from_cells(header: Vec<String>, rows: Vec<Vec<(Value, String)>>) -> Result<Self> {
        if header.is_empty() {
            return Err(AuditError::Schema("dataset has no columns".to_string()));
        }

        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(rows.len()),
                raw: Vec::with_capacity(rows.len()),
            })
            .collect();

        let row_count = rows.len();
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AuditError::Schema(format!(
                    "row {} has {} value(s), header has {}",
                    row_idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
            for (column, (value, raw)) in columns.iter_mut().zip(row) {
                column.values.push(value);
                column.raw.push(raw);
            }
        }

        Self::from_columns(columns, row_count)
    }

    fn from_columns(columns: Vec<Column>, row_count: usize) -> Result<Self> {
        let mut lookup = HashMap::new();
        for (idx, column) in columns.iter().enumerate() {
            if lookup.insert(column.name.clone(), idx).is_some() {
                return Err(AuditError::Schema(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            row_count,
            lookup,
        })
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    /// Find a column by exact name, falling back to a whitespace- and
    /// case-insensitive match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.lookup.get(name) {
            return Some(*idx);
        }
        self.columns
            .iter()
            .position(|column| names_match(&column.name, name))
    }

    pub fn value(&self, column: usize, row: usize) -> &Value {
        &self.columns[column].values[row]
    }
}
