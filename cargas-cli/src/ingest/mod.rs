//! File ingestion: cell values, grid normalization and spreadsheet readers

mod grid;
mod reader;
mod value;

pub use grid::Grid;
pub use reader::{FileKind, read_grid, validate_headers};
pub use value::Value;
