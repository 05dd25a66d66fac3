//! Template-driven spreadsheet validation and ingestion.
//!
//! A load takes an uploaded `.csv`/`.xls`/`.xlsx` file, checks it against a
//! configured template (columns, data types, validation rules), persists the
//! valid rows into the template's physical table and writes an annotated
//! report for the rejected ones.

pub mod config;
pub mod error;
pub mod ingest;
pub mod load;
pub mod persist;
pub mod report;
pub mod repository;
pub mod rules;
pub mod validate;

pub use config::AppConfig;
pub use error::LoadError;
pub use load::{LoadSummary, process_template_load, upload_template_load};
