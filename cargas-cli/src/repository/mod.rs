//! Repository layer for database operations

pub mod loads;
pub mod schema;
pub mod templates;

pub use loads::{LoadRecord, LoadStatus};
pub use templates::{Template, TemplateColumn};
