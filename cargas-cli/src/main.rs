use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use cargas::ingest::{FileKind, read_grid};
use cargas::{AppConfig, process_template_load, upload_template_load};

#[derive(Parser)]
#[command(name = "cargas-cli", about = "Valida y carga archivos contra plantillas configuradas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and load a file against a template
    Process {
        /// Template id the file belongs to
        #[arg(long)]
        template: i64,
        /// Uploading user id
        #[arg(long)]
        user: i64,
        /// Path of the file to load
        file: PathBuf,
    },
    /// Parse a file and print its normalized shape without touching the database
    Check {
        /// Path of the file to inspect
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Process {
            template,
            user,
            file,
        } => {
            let config = AppConfig::from_env()?;
            let pool = SqlitePool::connect(&config.database_url)
                .await
                .context("Failed to connect to database")?;
            cargas::repository::schema::init(&pool).await?;

            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let payload = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let load_id =
                upload_template_load(&pool, user, template, &file_name, &payload).await?;
            let summary =
                process_template_load(&pool, &config.files_dir, load_id, &payload).await?;

            println!(
                "Carga {} completada: {} filas, {} rechazadas, {} insertadas",
                summary.load_id, summary.total_rows, summary.error_rows, summary.persisted_rows
            );
            println!("Reporte: {}", summary.report_path);
        }
        Command::Check { file } => {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let kind = FileKind::from_file_name(&file_name)?;
            let payload = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let grid = read_grid(&payload, kind)?;
            println!("Columnas: {}", grid.headers.join(", "));
            println!("Filas (sin vacías): {}", grid.rows.len());
        }
    }

    Ok(())
}
