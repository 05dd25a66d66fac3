//! Cell value representation for ingested spreadsheets

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single cell value as it flows through ingestion, validation and
/// persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Null/empty cell
    Null,
    /// String value
    Text(String),
    /// Whole number
    Int(i64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Date and time (no timezone; spreadsheet cells carry none)
    DateTime(NaiveDateTime),
    /// Structured JSON payload
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Collapse blank and whitespace-only strings to `Null` and trim the
    /// rest. Applying this twice yields the same value as applying it once.
    pub fn normalized(self) -> Value {
        match self {
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else if trimmed.len() == s.len() {
                    Value::Text(s)
                } else {
                    Value::Text(trimmed.to_string())
                }
            }
            Value::Float(f) if f.is_nan() => Value::Null,
            other => other,
        }
    }

    /// Render the value the way it would appear in a spreadsheet cell
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Json(j) => j.to_string(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "(vacío)"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}
