//! Load orchestration
//!
//! Two entry points mirror the upload flow: `upload_template_load` verifies
//! access and preconditions and creates the Load in `processing`;
//! `process_template_load` runs ingest, validation, persistence and report,
//! then moves the Load to its terminal state. Any pipeline error marks the
//! load `failed` before propagating to the caller.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use sqlx::SqlitePool;

use crate::error::LoadError;
use crate::ingest::{FileKind, read_grid, validate_headers};
use crate::persist::insert_valid_rows;
use crate::report::write_report;
use crate::repository::{loads, templates};
use crate::rules::{DataType, parse_rule};
use crate::validate::{ColumnPlan, validate_grid};

/// What a completed load reports back to the caller
#[derive(Debug)]
pub struct LoadSummary {
    pub load_id: i64,
    pub total_rows: i64,
    pub error_rows: i64,
    pub persisted_rows: i64,
    pub report_path: String,
}

/// Verify access and preconditions, then create the Load in `processing`
pub async fn upload_template_load(
    pool: &SqlitePool,
    user_id: i64,
    template_id: i64,
    file_name: &str,
    payload: &[u8],
) -> Result<i64> {
    if !templates::user_has_access(pool, user_id, template_id).await? {
        return Err(LoadError::unauthorized(
            "El usuario no tiene acceso a la plantilla",
        )
        .into());
    }

    let template = templates::get_active_template(pool, template_id)
        .await?
        .ok_or_else(|| LoadError::config("La plantilla no existe o está inactiva"))?;

    // Reject unsupported extensions before reading a single byte
    FileKind::from_file_name(file_name)?;

    if payload.is_empty() {
        return Err(LoadError::config("El archivo está vacío").into());
    }

    let columns = templates::get_active_columns(pool, template_id).await?;
    if columns.is_empty() {
        return Err(LoadError::config(
            "La plantilla no tiene columnas activas para importar",
        )
        .into());
    }

    let load_id = loads::create_load(pool, template_id, user_id, file_name).await?;
    info!(
        "load {} created for template '{}' by user {}",
        load_id, template.name, user_id
    );
    Ok(load_id)
}

/// Run the full pipeline for a load already in `processing`
///
/// The terminal state is always written before returning: `completed` with
/// counts and report path, or `failed` with the triggering error re-raised.
pub async fn process_template_load(
    pool: &SqlitePool,
    files_dir: &Path,
    load_id: i64,
    payload: &[u8],
) -> Result<LoadSummary> {
    match run_pipeline(pool, files_dir, load_id, payload).await {
        Ok(summary) => Ok(summary),
        Err(error) => {
            warn!("load {} failed: {:#}", load_id, error);
            loads::mark_failed(pool, load_id).await?;
            Err(error)
        }
    }
}

async fn run_pipeline(
    pool: &SqlitePool,
    files_dir: &Path,
    load_id: i64,
    payload: &[u8],
) -> Result<LoadSummary> {
    let load = loads::get_load(pool, load_id)
        .await?
        .ok_or_else(|| anyhow!("Load {} not found", load_id))?;

    let template = templates::get_active_template(pool, load.template_id)
        .await?
        .ok_or_else(|| LoadError::config("La plantilla no existe o está inactiva"))?;

    let columns = templates::get_active_columns(pool, load.template_id).await?;
    if columns.is_empty() {
        return Err(LoadError::config(
            "La plantilla no tiene columnas activas para importar",
        )
        .into());
    }

    let mut plans = Vec::with_capacity(columns.len());
    for column in &columns {
        let payloads = templates::get_column_rules(pool, column.id).await?;
        let mut rules = Vec::with_capacity(payloads.len());
        for rule_payload in &payloads {
            let rule = parse_rule(rule_payload).with_context(|| {
                format!("Regla malformada en la columna '{}'", column.name)
            })?;
            rules.push(rule);
        }
        plans.push(ColumnPlan {
            name: column.name.clone(),
            data_type: DataType::from_label(&column.data_type),
            type_label: column.data_type.clone(),
            rules,
        });
    }

    let kind = FileKind::from_file_name(&load.file_name)?;
    let grid = read_grid(payload, kind)?;

    let expected: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    validate_headers(&grid.headers, &expected)?;

    let outcome = validate_grid(&grid, &plans)?;
    let persisted = insert_valid_rows(pool, &template.table_name, &outcome, load_id).await?;

    let relative = write_report(files_dir, &template.table_name, load_id, &outcome)?;
    let report_path = relative.to_string_lossy().into_owned();

    let report_file = files_dir.join(&relative);
    let size = std::fs::metadata(&report_file)
        .map(|m| m.len() as i64)
        .unwrap_or(0);
    let report_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report_path.clone());
    loads::register_loaded_file(
        pool,
        load.user_id,
        load.template_id,
        load_id,
        &report_name,
        &report_path,
        size,
    )
    .await?;

    let total_rows = outcome.total_rows();
    let error_rows = outcome.error_rows();
    loads::mark_completed(pool, load_id, total_rows, error_rows, &report_path).await?;

    info!(
        "load {} completed: {} rows, {} rejected, {} persisted into {}",
        load_id, total_rows, error_rows, persisted, template.table_name
    );

    Ok(LoadSummary {
        load_id,
        total_rows,
        error_rows,
        persisted_rows: persisted,
        report_path,
    })
}
