//! Annotated report artifact
//!
//! Every load, successful or not at the row level, leaves behind a spreadsheet
//! with the full coerced grid plus Status and Observaciones columns. This is
//! the audit trail a user reviews to fix rejected rows and re-upload.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::LoadError;
use crate::ingest::Value;
use crate::validate::ValidationOutcome;

const STATUS_COL: &str = "Status";
const OBSERVATIONS_COL: &str = "Observaciones";

const STATUS_OK: &str = "Procesado";
const STATUS_REJECTED: &str = "No procesado";

/// Deterministic artifact path for one load
pub fn report_path(files_dir: &Path, table_name: &str, load_id: i64) -> PathBuf {
    files_dir
        .join("Reports")
        .join(table_name)
        .join(format!("load_{}_reporte.xlsx", load_id))
}

/// Write the annotated grid; returns the path relative to `files_dir`
pub fn write_report(
    files_dir: &Path,
    table_name: &str,
    load_id: i64,
    outcome: &ValidationOutcome,
) -> Result<PathBuf> {
    let path = report_path(files_dir, table_name, load_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            LoadError::report(format!(
                "Failed to create report directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, name) in outcome.headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }
    let status_col = outcome.headers.len() as u16;
    worksheet.write_string(0, status_col, STATUS_COL)?;
    worksheet.write_string(0, status_col + 1, OBSERVATIONS_COL)?;

    for (row_idx, cells) in outcome.rows.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col_idx, value) in cells.iter().enumerate() {
            write_value(worksheet, row, col_idx as u16, value)?;
        }
        let status = if outcome.row_valid[row_idx] {
            STATUS_OK
        } else {
            STATUS_REJECTED
        };
        worksheet.write_string(row, status_col, status)?;
        if !outcome.observations[row_idx].is_empty() {
            worksheet.write_string(row, status_col + 1, &outcome.observations[row_idx])?;
        }
    }

    workbook
        .save(&path)
        .map_err(|e| LoadError::report(format!("Failed to save report {}: {}", path.display(), e)))?;

    info!("load {}: report written to {}", load_id, path.display());

    let relative = path
        .strip_prefix(files_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.clone());
    Ok(relative)
}

fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
    match value {
        Value::Null => { /* leave cell empty */ }
        Value::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        Value::Int(i) => {
            ws.write_number(row, col, *i as f64)?;
        }
        Value::Float(f) => {
            ws.write_number(row, col, *f)?;
        }
        Value::Bool(b) => {
            ws.write_string(row, col, &b.to_string())?;
        }
        Value::Date(d) => {
            ws.write_string(row, col, &d.format("%Y-%m-%d").to_string())?;
        }
        Value::DateTime(dt) => {
            ws.write_string(row, col, &dt.format("%Y-%m-%d %H:%M:%S").to_string())?;
        }
        Value::Json(j) => {
            ws.write_string(row, col, &j.to_string())?;
        }
    }
    Ok(())
}
