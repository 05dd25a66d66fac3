//! Metadata schema bootstrap
//!
//! Template, rule and load metadata lives in these tables. The physical
//! per-template data tables are provisioned externally and are never
//! created here.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        table_name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS template_columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        template_id INTEGER NOT NULL REFERENCES templates(id),
        name TEXT NOT NULL,
        data_type TEXT NOT NULL,
        position INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS rules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        payload TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS template_column_rules (
        column_id INTEGER NOT NULL REFERENCES template_columns(id),
        rule_id INTEGER NOT NULL REFERENCES rules(id),
        PRIMARY KEY (column_id, rule_id)
    )",
    "CREATE TABLE IF NOT EXISTS template_user_access (
        user_id INTEGER NOT NULL,
        template_id INTEGER NOT NULL REFERENCES templates(id),
        is_active INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (user_id, template_id)
    )",
    "CREATE TABLE IF NOT EXISTS loads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        template_id INTEGER NOT NULL REFERENCES templates(id),
        user_id INTEGER NOT NULL,
        file_name TEXT NOT NULL,
        status TEXT NOT NULL,
        total_rows INTEGER,
        error_rows INTEGER,
        report_path TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS loaded_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        template_id INTEGER NOT NULL REFERENCES templates(id),
        load_id INTEGER NOT NULL REFERENCES loads(id),
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        size INTEGER NOT NULL,
        sequence INTEGER NOT NULL
    )",
];

/// Create the metadata tables if they do not exist yet
pub async fn init(pool: &SqlitePool) -> Result<()> {
    for statement in TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to initialize metadata schema")?;
    }
    Ok(())
}
