//! Fallback type parsers
//!
//! One pure total function per base data type. Null always passes through
//! untouched: nullability is the "required" flag's concern, not the
//! parser's. Errors are localized messages that end up in the row's
//! Observations.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::ingest::Value;

use super::types::{DataType, fold_label};

const TRUTHY: [&str; 4] = ["true", "1", "yes", "si"];
const FALSY: [&str; 3] = ["false", "0", "no"];

/// Coerce `value` to the given base type, or return a localized error
pub fn parse_value(data_type: DataType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match data_type {
        DataType::Text => Ok(Value::Text(value.to_text())),
        DataType::Integer => parse_integer(value),
        DataType::Float => parse_float(value),
        DataType::Boolean => parse_boolean(value),
        DataType::Date => parse_date(value),
        DataType::DateTime => parse_datetime(value),
        DataType::Json => parse_json(value),
    }
}

fn parse_integer(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe ser un número entero";
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
            Ok(Value::Int(*f as i64))
        }
        Value::Text(s) => {
            let decimal = Decimal::from_str(s.trim()).map_err(|_| ERROR.to_string())?;
            if decimal != decimal.trunc() {
                return Err(ERROR.to_string());
            }
            decimal
                .to_i64()
                .map(Value::Int)
                .ok_or_else(|| ERROR.to_string())
        }
        _ => Err(ERROR.to_string()),
    }
}

fn parse_float(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe ser un número";
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ERROR.to_string()),
        _ => Err(ERROR.to_string()),
    }
}

fn parse_boolean(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe ser un valor booleano";
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Float(f) if *f == 0.0 => Ok(Value::Bool(false)),
        Value::Float(f) if *f == 1.0 => Ok(Value::Bool(true)),
        Value::Text(s) => {
            let token = fold_label(s);
            if TRUTHY.contains(&token.as_str()) {
                Ok(Value::Bool(true))
            } else if FALSY.contains(&token.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(ERROR.to_string())
            }
        }
        _ => Err(ERROR.to_string()),
    }
}

fn parse_date(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe ser una fecha válida";
    match value {
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::DateTime(dt) => Ok(Value::Date(dt.date())),
        Value::Text(s) => parse_date_generic(s)
            .map(Value::Date)
            .ok_or_else(|| ERROR.to_string()),
        _ => Err(ERROR.to_string()),
    }
}

fn parse_datetime(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe ser una fecha y hora válida";
    match value {
        Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
        Value::Date(d) => Ok(Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default())),
        Value::Text(s) => parse_datetime_generic(s)
            .map(Value::DateTime)
            .ok_or_else(|| ERROR.to_string()),
        _ => Err(ERROR.to_string()),
    }
}

fn parse_json(value: &Value) -> Result<Value, String> {
    const ERROR: &str = "debe contener un JSON válido";
    match value {
        Value::Json(j) => Ok(Value::Json(j.clone())),
        Value::Text(s) => serde_json::from_str(s)
            .map(Value::Json)
            .map_err(|_| ERROR.to_string()),
        _ => Err(ERROR.to_string()),
    }
}

const DATE_PATTERNS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y"];
const DATETIME_PATTERNS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Generic date parse tried when no explicit format is configured
pub fn parse_date_generic(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    for pattern in DATE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, pattern) {
            return Some(date);
        }
    }
    parse_datetime_generic(trimmed).map(|dt| dt.date())
}

/// Generic datetime parse tried when no explicit format is configured
pub fn parse_datetime_generic(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    for pattern in DATETIME_PATTERNS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(datetime);
        }
    }
    for pattern in DATE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, pattern) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
