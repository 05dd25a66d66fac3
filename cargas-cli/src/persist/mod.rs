//! Persistence stage
//!
//! Takes the coerced grid's valid rows and bulk-inserts them into the
//! template's physical table. The table is provisioned elsewhere; this stage
//! only writes into it, inside a single transaction, with the load id
//! appended as `numero_operacion` on every row.

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Arguments, SqlitePool};

use crate::error::LoadError;
use crate::ingest::Value;
use crate::rules::types::strip_accent;
use crate::validate::ValidationOutcome;

/// SQLite caps host parameters well above this; 100 rows per statement keeps
/// statements small without a round trip per row
const INSERT_CHUNK_ROWS: usize = 100;

const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Validate a name for direct interpolation into SQL as an identifier
pub fn ensure_identifier(name: &str) -> Result<String, LoadError> {
    let candidate = name.trim().to_lowercase();
    if candidate.is_empty() || candidate.len() > MAX_IDENTIFIER_LEN {
        return Err(LoadError::config(format!(
            "Identificador inválido: '{}'",
            name
        )));
    }
    if !IDENTIFIER_RE.is_match(&candidate) {
        return Err(LoadError::config(format!(
            "Identificador inválido: '{}'",
            name
        )));
    }
    Ok(candidate)
}

/// Derive the physical column name for a template column's display name
pub fn column_identifier(display_name: &str) -> Result<String, LoadError> {
    let mut sanitized = String::with_capacity(display_name.len());
    for ch in display_name.trim().chars() {
        let ch = strip_accent(ch);
        if ch.is_whitespace() || matches!(ch, '-' | '/' | '.') {
            if !sanitized.ends_with('_') {
                sanitized.push('_');
            }
        } else {
            for lower in ch.to_lowercase() {
                sanitized.push(lower);
            }
        }
    }
    let sanitized = sanitized.trim_matches('_').to_string();
    ensure_identifier(&sanitized)
}

/// Insert every valid row of the outcome into `table_name`
///
/// All-or-nothing: any bind or execute failure rolls the transaction back
/// and surfaces as a storage error.
pub async fn insert_valid_rows(
    pool: &SqlitePool,
    table_name: &str,
    outcome: &ValidationOutcome,
    load_id: i64,
) -> Result<i64> {
    let table = ensure_identifier(table_name)?;
    let mut columns = Vec::with_capacity(outcome.headers.len() + 1);
    for header in &outcome.headers {
        columns.push(column_identifier(header)?);
    }
    columns.push("numero_operacion".to_string());

    let valid = outcome.valid_indices();
    if valid.is_empty() {
        debug!("load {}: no valid rows to persist", load_id);
        return Ok(0);
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| LoadError::storage(format!("Failed to open insert transaction: {}", e)))?;

    for chunk in valid.chunks(INSERT_CHUNK_ROWS) {
        let row_placeholders = format!(
            "({})",
            vec!["?"; columns.len()].join(", ")
        );
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            vec![row_placeholders.as_str(); chunk.len()].join(", ")
        );

        let mut arguments = SqliteArguments::default();
        for &row_idx in chunk {
            for value in &outcome.rows[row_idx] {
                bind_value(&mut arguments, value)
                    .with_context(|| format!("Failed to bind row {}", row_idx))?;
            }
            arguments
                .add(load_id)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .context("Failed to bind load id")?;
        }

        sqlx::query_with(&sql, arguments)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                LoadError::storage(format!("Failed to insert rows into {}: {}", table, e))
            })?;
    }

    tx.commit()
        .await
        .map_err(|e| LoadError::storage(format!("Failed to commit insert: {}", e)))?;
    info!(
        "load {}: persisted {} rows into {}",
        load_id,
        valid.len(),
        table
    );
    Ok(valid.len() as i64)
}

/// Bind one cell, coercing temporals to timezone-free text the way the
/// target table stores them
fn bind_value(arguments: &mut SqliteArguments<'_>, value: &Value) -> Result<()> {
    let result = match value {
        Value::Null => arguments.add(Option::<String>::None),
        Value::Text(s) => arguments.add(s.clone()),
        Value::Int(i) => arguments.add(*i),
        Value::Float(f) => arguments.add(*f),
        Value::Bool(b) => arguments.add(*b),
        Value::Date(d) => arguments.add(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => arguments.add(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Json(j) => arguments.add(j.to_string()),
    };
    result.map_err(|e| anyhow::anyhow!("{}", e))
}
