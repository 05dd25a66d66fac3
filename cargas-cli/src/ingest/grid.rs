//! Normalized rectangular grid of cells

use std::collections::HashMap;

use super::Value;

/// A rectangular grid of cells with string column headers
///
/// Every row has exactly `headers.len()` cells; readers pad short rows with
/// `Value::Null` before the grid is constructed.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    /// Column headers, trimmed of surrounding whitespace
    pub headers: Vec<String>,
    /// Row-major cell data
    pub rows: Vec<Vec<Value>>,
}

impl Grid {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Grid { headers, rows }
    }

    /// Index of a header by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Normalize every cell (blank-to-null collapse) and drop rows that are
    /// entirely null. Row indices are contiguous afterwards.
    pub fn normalize(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                let value = std::mem::take(cell);
                *cell = value.normalized();
            }
        }
        self.rows.retain(|row| row.iter().any(|cell| !cell.is_null()));
    }

    /// Snapshot of a single row keyed by header name
    pub fn row_snapshot(&self, row_idx: usize) -> HashMap<String, Value> {
        let mut snapshot = HashMap::new();
        if let Some(row) = self.rows.get(row_idx) {
            for (header, cell) in self.headers.iter().zip(row.iter()) {
                snapshot.insert(header.clone(), cell.clone());
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        Grid::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Text(" x ".into()), Value::Text("".into())],
                vec![Value::Text("  ".into()), Value::Null],
                vec![Value::Int(1), Value::Text("y".into())],
            ],
        )
    }

    #[test]
    fn test_normalize_drops_blank_rows() {
        let mut grid = sample_grid();
        grid.normalize();
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0][0], Value::Text("x".into()));
        assert_eq!(grid.rows[0][1], Value::Null);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut once = sample_grid();
        once.normalize();
        let mut twice = once.clone();
        twice.normalize();
        assert_eq!(once.rows, twice.rows);
    }

    #[test]
    fn test_row_snapshot() {
        let mut grid = sample_grid();
        grid.normalize();
        let snapshot = grid.row_snapshot(1);
        assert_eq!(snapshot.get("a"), Some(&Value::Int(1)));
        assert_eq!(snapshot.get("b"), Some(&Value::Text("y".into())));
    }
}
