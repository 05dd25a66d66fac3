//! Environment-driven configuration

use std::path::PathBuf;

use anyhow::Result;

use crate::error::LoadError;

/// Runtime settings, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sqlx connection string for the metadata and data store
    pub database_url: String,
    /// Root directory for report artifacts
    pub files_dir: PathBuf,
}

impl AppConfig {
    /// Read configuration from the environment, loading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("CARGAS_DATABASE_URL")
            .map_err(|_| LoadError::config("CARGAS_DATABASE_URL no está definida"))?;
        let files_dir = std::env::var("CARGAS_FILES_DIR").unwrap_or_else(|_| "Files".to_string());

        Ok(AppConfig {
            database_url,
            files_dir: PathBuf::from(files_dir),
        })
    }
}
