//! Load lifecycle records and registered file metadata

use anyhow::{Context, Result, bail};
use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;

/// Lifecycle of one load: `processing` until the pipeline finishes, then
/// exactly one of the terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Processing,
    Completed,
    Failed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Processing => "processing",
            LoadStatus::Completed => "completed",
            LoadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(LoadStatus::Processing),
            "completed" => Ok(LoadStatus::Completed),
            "failed" => Ok(LoadStatus::Failed),
            other => bail!("Unknown load status: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub id: i64,
    pub template_id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub status: LoadStatus,
    pub total_rows: Option<i64>,
    pub error_rows: Option<i64>,
    pub report_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

/// Create a load in `processing` state, before any file parsing
pub async fn create_load(
    pool: &SqlitePool,
    template_id: i64,
    user_id: i64,
    file_name: &str,
) -> Result<i64> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO loads (template_id, user_id, file_name, status, created_at, started_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(template_id)
    .bind(user_id)
    .bind(file_name)
    .bind(LoadStatus::Processing.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create load")?;

    Ok(result.last_insert_rowid())
}

pub async fn get_load(pool: &SqlitePool, load_id: i64) -> Result<Option<LoadRecord>> {
    type Row = (
        i64,
        i64,
        i64,
        String,
        String,
        Option<i64>,
        Option<i64>,
        Option<String>,
        NaiveDateTime,
        NaiveDateTime,
        Option<NaiveDateTime>,
    );
    let row: Option<Row> = sqlx::query_as(
        "SELECT id, template_id, user_id, file_name, status,
                total_rows, error_rows, report_path, created_at, started_at, finished_at
         FROM loads WHERE id = ?",
    )
    .bind(load_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get load")?;

    row.map(
        |(
            id,
            template_id,
            user_id,
            file_name,
            status,
            total_rows,
            error_rows,
            report_path,
            created_at,
            started_at,
            finished_at,
        )| {
            Ok(LoadRecord {
                id,
                template_id,
                user_id,
                file_name,
                status: LoadStatus::parse(&status)?,
                total_rows,
                error_rows,
                report_path,
                created_at,
                started_at,
                finished_at,
            })
        },
    )
    .transpose()
}

/// Record a fully successful run: counts, report path, terminal state
pub async fn mark_completed(
    pool: &SqlitePool,
    load_id: i64,
    total_rows: i64,
    error_rows: i64,
    report_path: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE loads
         SET status = ?, total_rows = ?, error_rows = ?, report_path = ?, finished_at = ?
         WHERE id = ?",
    )
    .bind(LoadStatus::Completed.as_str())
    .bind(total_rows)
    .bind(error_rows)
    .bind(report_path)
    .bind(Utc::now().naive_utc())
    .bind(load_id)
    .execute(pool)
    .await
    .context("Failed to mark load completed")?;

    Ok(())
}

/// Terminal failure: prior field values stay untouched besides the status
pub async fn mark_failed(pool: &SqlitePool, load_id: i64) -> Result<()> {
    sqlx::query("UPDATE loads SET status = ?, finished_at = ? WHERE id = ?")
        .bind(LoadStatus::Failed.as_str())
        .bind(Utc::now().naive_utc())
        .bind(load_id)
        .execute(pool)
        .await
        .context("Failed to mark load failed")?;

    Ok(())
}

/// Register the report artifact against the uploader, with a per-user
/// sequence number
pub async fn register_loaded_file(
    pool: &SqlitePool,
    user_id: i64,
    template_id: i64,
    load_id: i64,
    name: &str,
    path: &str,
    size: i64,
) -> Result<i64> {
    let (previous,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM loaded_files WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to count loaded files")?;
    let sequence = previous + 1;

    sqlx::query(
        "INSERT INTO loaded_files (user_id, template_id, load_id, name, path, size, sequence)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(template_id)
    .bind(load_id)
    .bind(name)
    .bind(path)
    .bind(size)
    .bind(sequence)
    .execute(pool)
    .await
    .context("Failed to register loaded file")?;

    Ok(sequence)
}
