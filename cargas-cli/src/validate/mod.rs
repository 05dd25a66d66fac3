//! Validation driver
//!
//! Walks the normalized grid column by column against the template's rule
//! plan. The row snapshot every cross-field rule reads is frozen before any
//! rule runs, so dependency and joint rules never observe a value that is
//! mid-coercion in the same pass. Duplicate rules run afterwards over the
//! whole coerced grid.

use std::collections::HashMap;

use log::debug;

use crate::error::LoadError;
use crate::ingest::{Grid, Value};
use crate::rules::{CellContext, DataType, DuplicateConfig, RuleCheck, RuleExpr, evaluate_all};

/// Resolved validation plan for one active template column
pub struct ColumnPlan {
    pub name: String,
    /// None when the declared type label maps to no parser
    pub data_type: Option<DataType>,
    pub type_label: String,
    pub rules: Vec<RuleExpr>,
}

/// Result of the per-cell pass plus the duplicate pass
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Template column names, in template order
    pub headers: Vec<String>,
    /// Coerced grid; cells that failed keep their normalized input value
    pub rows: Vec<Vec<Value>>,
    /// Per-row error messages joined with "; " (empty string when valid)
    pub observations: Vec<String>,
    pub row_valid: Vec<bool>,
}

impl ValidationOutcome {
    pub fn total_rows(&self) -> i64 {
        self.rows.len() as i64
    }

    pub fn error_rows(&self) -> i64 {
        self.row_valid.iter().filter(|valid| !**valid).count() as i64
    }

    pub fn valid_indices(&self) -> Vec<usize> {
        self.row_valid
            .iter()
            .enumerate()
            .filter(|(_, valid)| **valid)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Run every column's rules over every row of an already-normalized grid
pub fn validate_grid(grid: &Grid, columns: &[ColumnPlan]) -> Result<ValidationOutcome, LoadError> {
    if columns.is_empty() {
        return Err(LoadError::config(
            "La plantilla no tiene columnas activas para importar",
        ));
    }
    for column in columns {
        if column.data_type.is_none() && column.rules.is_empty() {
            return Err(LoadError::config(format!(
                "Tipo de dato '{}' no soportado en la columna '{}'",
                column.type_label, column.name
            )));
        }
    }

    let mut indices = Vec::with_capacity(columns.len());
    for column in columns {
        let idx = grid.column_index(&column.name).ok_or_else(|| {
            LoadError::config(format!(
                "La columna '{}' no está presente en el archivo",
                column.name
            ))
        })?;
        indices.push(idx);
    }

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(grid.rows.len());
    let mut row_errors: Vec<Vec<String>> = Vec::with_capacity(grid.rows.len());

    for (row_idx, _) in grid.rows.iter().enumerate() {
        let snapshot = grid.row_snapshot(row_idx);
        let mut out_row = Vec::with_capacity(columns.len());
        let mut errors: Vec<String> = Vec::new();

        for (column, &cell_idx) in columns.iter().zip(&indices) {
            let cell = grid.rows[row_idx][cell_idx].clone();
            let ctx = CellContext {
                column: &column.name,
                row: &snapshot,
                fallback: column.data_type,
            };
            let (coerced, cell_errors) = evaluate_all(&column.rules, cell.clone(), &ctx);
            if cell_errors.is_empty() {
                out_row.push(coerced);
            } else {
                // The report must show the offending input, not a value some
                // earlier stage half-transformed
                out_row.push(cell);
                errors.extend(cell_errors);
            }
        }

        rows.push(out_row);
        row_errors.push(errors);
    }

    let headers: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    apply_duplicate_rules(columns, &headers, &rows, &mut row_errors);

    let observations: Vec<String> = row_errors
        .iter()
        .map(|errors| dedupe(errors).join("; "))
        .collect();
    let row_valid: Vec<bool> = row_errors.iter().map(|errors| errors.is_empty()).collect();

    debug!(
        "validated {} rows across {} columns ({} invalid)",
        rows.len(),
        columns.len(),
        row_valid.iter().filter(|v| !**v).count()
    );

    Ok(ValidationOutcome {
        headers,
        rows,
        observations,
        row_valid,
    })
}

fn dedupe(errors: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for error in errors {
        if !seen.contains(error) {
            seen.push(error.clone());
        }
    }
    seen
}

/// Collect every duplicate rule configured across the template, deduplicated
/// so a rule shared by several columns runs once
fn collect_duplicate_configs(columns: &[ColumnPlan]) -> Vec<(String, DuplicateConfig)> {
    fn walk(expr: &RuleExpr, column: &str, out: &mut Vec<(String, DuplicateConfig)>) {
        match expr {
            RuleExpr::Stage(stage) => {
                if let RuleCheck::Duplicates(config) = &stage.check {
                    out.push((column.to_string(), config.clone()));
                }
            }
            RuleExpr::Chain(stages) => {
                for stage in stages {
                    walk(stage, column, out);
                }
            }
        }
    }

    let mut found = Vec::new();
    for column in columns {
        for expr in &column.rules {
            walk(expr, &column.name, &mut found);
        }
    }

    let mut unique: Vec<(String, DuplicateConfig)> = Vec::new();
    for (column, config) in found {
        let duplicate = unique.iter().any(|(_, existing)| {
            existing.fields == config.fields
                && existing.name == config.name
                && existing.message == config.message
        });
        if !duplicate {
            unique.push((column, config));
        }
    }
    unique
}

fn apply_duplicate_rules(
    columns: &[ColumnPlan],
    headers: &[String],
    rows: &[Vec<Value>],
    row_errors: &mut [Vec<String>],
) {
    for (column, config) in collect_duplicate_configs(columns) {
        // A rule with no explicit field list keys on its own column
        let fields: Vec<String> = if config.fields.is_empty() {
            vec![column.clone()]
        } else {
            config.fields.clone()
        };

        let mut field_indices = Vec::with_capacity(fields.len());
        let mut missing: Vec<&String> = Vec::new();
        for field in &fields {
            match headers.iter().position(|h| h == field) {
                Some(idx) => field_indices.push(idx),
                None => missing.push(field),
            }
        }
        if !missing.is_empty() {
            let detail = format!(
                "{}: la regla de duplicados referencia columnas inexistentes ({})",
                config.name.as_deref().unwrap_or(&column),
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let error = match &config.message {
                Some(message) => format!("{} ({})", message, detail),
                None => detail,
            };
            for errors in row_errors.iter_mut() {
                errors.push(error.clone());
            }
            continue;
        }

        let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let key: Vec<String> = field_indices
                .iter()
                .map(|&idx| row[idx].clone().normalized().to_text())
                .collect();
            if config.ignore_empty && key.iter().all(|part| part.is_empty()) {
                continue;
            }
            groups.entry(key).or_default().push(row_idx);
        }

        for (_, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let detail = format!(
                "{}: valores duplicados en ({})",
                config.name.as_deref().unwrap_or(&column),
                fields.join(", ")
            );
            let error = match &config.message {
                Some(message) => format!("{} ({})", message, detail),
                None => detail.clone(),
            };
            for row_idx in members {
                row_errors[row_idx].push(error.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rules::parse_rule;

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn grid(headers: &[&str], rows: Vec<Vec<Value>>) -> Grid {
        Grid {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn plan(name: &str, data_type: DataType, payload: Option<serde_json::Value>) -> ColumnPlan {
        ColumnPlan {
            name: name.to_string(),
            data_type: Some(data_type),
            type_label: format!("{:?}", data_type),
            rules: payload
                .map(|p| vec![parse_rule(&p).unwrap()])
                .unwrap_or_default(),
        }
    }

    #[test]
    fn test_zero_columns_fails_fast() {
        let grid = grid(&["A"], vec![vec![text("x")]]);
        let err = validate_grid(&grid, &[]).unwrap_err();
        assert!(err.to_string().contains("columnas activas"));
    }

    #[test]
    fn test_unknown_type_without_rule_is_config_error() {
        let grid = grid(&["A"], vec![vec![text("x")]]);
        let columns = vec![ColumnPlan {
            name: "A".to_string(),
            data_type: None,
            type_label: "misterio".to_string(),
            rules: Vec::new(),
        }];
        let err = validate_grid(&grid, &columns).unwrap_err();
        assert!(err.to_string().contains("misterio"));
    }

    #[test]
    fn test_end_to_end_row_partitioning() {
        let grid = grid(
            &["Nombre", "Edad", "Correo"],
            vec![
                vec![text("Ana"), text("30"), text("ana@x.com")],
                vec![text("Luis"), text("30.5"), text("luis@x.com")],
                vec![Value::Null, text("40"), text("bad-email")],
            ],
        );
        let columns = vec![
            plan(
                "Nombre",
                DataType::Text,
                Some(json!({"Tipo de dato": "Texto", "Campo obligatorio": true})),
            ),
            plan(
                "Edad",
                DataType::Float,
                Some(json!({"Tipo de dato": "Número", "Regla": {"Número de decimales": 0}})),
            ),
            plan(
                "Correo",
                DataType::Text,
                Some(json!({
                    "Tipo de dato": "Correo",
                    "Regla": {"Formato": r"[^@\s]+@[^@\s]+\.[^@\s]+"}
                })),
            ),
        ];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert_eq!(outcome.total_rows(), 3);
        assert_eq!(outcome.error_rows(), 2);
        assert_eq!(outcome.valid_indices(), vec![0]);
        assert_eq!(outcome.rows[0][1], Value::Int(30));
        assert!(outcome.observations[0].is_empty());
        assert!(outcome.observations[1].contains("decimales"));
        assert!(outcome.observations[2].contains("es obligatorio"));
        assert!(outcome.observations[2].contains("correo"));
    }

    #[test]
    fn test_failed_cell_keeps_normalized_input() {
        let grid = grid(&["Edad"], vec![vec![text("treinta")]]);
        let columns = vec![plan("Edad", DataType::Integer, None)];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert_eq!(outcome.rows[0][0], text("treinta"));
        assert!(!outcome.row_valid[0]);
    }

    #[test]
    fn test_dependency_reads_frozen_snapshot() {
        // The sibling column is declared later than the dependent one; the
        // frozen snapshot makes declaration order irrelevant
        let grid = grid(
            &["Documento", "Tipo Documento"],
            vec![vec![text("1234"), text("DNI")]],
        );
        let columns = vec![
            plan(
                "Documento",
                DataType::Text,
                Some(json!({
                    "Tipo de dato": "Dependencia",
                    "Regla": {
                        "reglas especifica": [
                            {"Tipo Documento": "DNI", "documento": {"Longitud minima": 8}}
                        ]
                    }
                })),
            ),
            plan("Tipo Documento", DataType::Text, None),
        ];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert!(!outcome.row_valid[0]);
        assert!(outcome.observations[0].contains("longitud mínima"));
    }

    #[test]
    fn test_joint_rule_errors_both_fields_of_partial_set() {
        let grid = grid(
            &["Calle", "Ciudad"],
            vec![vec![text("Av. Lima"), Value::Null]],
        );
        let joint = json!({
            "Tipo de dato": "Validación conjunta",
            "Regla": {"Nombre de campos": ["Calle", "Ciudad"]}
        });
        let columns = vec![
            plan("Calle", DataType::Text, Some(joint.clone())),
            plan("Ciudad", DataType::Text, Some(joint)),
        ];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert!(!outcome.row_valid[0]);
        assert!(outcome.observations[0].contains("Calle: completa todos los campos"));
        assert!(outcome.observations[0].contains("Ciudad: completa todos los campos"));
    }

    #[test]
    fn test_duplicate_rule_marks_every_occurrence() {
        let grid = grid(
            &["DNI", "Nombre"],
            vec![
                vec![text("111"), text("Ana")],
                vec![text("222"), text("Luis")],
                vec![text("111"), text("Eva")],
            ],
        );
        let columns = vec![
            plan(
                "DNI",
                DataType::Text,
                Some(json!({
                    "Tipo de dato": "Duplicados",
                    "Regla": {"Campos": ["DNI"], "Ignorar vacíos": true}
                })),
            ),
            plan("Nombre", DataType::Text, None),
        ];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert!(!outcome.row_valid[0]);
        assert!(outcome.row_valid[1]);
        assert!(!outcome.row_valid[2]);
        assert!(outcome.observations[0].contains("duplicados"));
    }

    #[test]
    fn test_duplicate_rule_ignores_all_empty_keys() {
        let grid = grid(
            &["DNI"],
            vec![vec![Value::Null], vec![Value::Null], vec![text("1")]],
        );
        let columns = vec![plan(
            "DNI",
            DataType::Text,
            Some(json!({
                "Tipo de dato": "Duplicados",
                "Regla": {"Campos": ["DNI"], "Ignorar vacíos": true}
            })),
        )];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert!(outcome.row_valid.iter().all(|v| *v));
    }

    #[test]
    fn test_duplicate_rule_missing_column_invalidates_all() {
        let grid = grid(&["DNI"], vec![vec![text("1")], vec![text("2")]]);
        let columns = vec![plan(
            "DNI",
            DataType::Text,
            Some(json!({
                "Tipo de dato": "Duplicados",
                "Regla": {"Campos": ["Pasaporte"]}
            })),
        )];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert!(outcome.row_valid.iter().all(|v| !*v));
        assert!(outcome.observations[0].contains("inexistentes"));
    }

    #[test]
    fn test_repeated_errors_deduped_in_observations() {
        let grid = grid(&["A"], vec![vec![text("x")]]);
        let columns = vec![ColumnPlan {
            name: "A".to_string(),
            data_type: Some(DataType::Text),
            type_label: "Texto".to_string(),
            rules: vec![
                parse_rule(&json!({"Tipo de dato": "Texto", "Regla": {"Longitud minima": 5}}))
                    .unwrap(),
                parse_rule(&json!({"Tipo de dato": "Texto", "Regla": {"Longitud minima": 5}}))
                    .unwrap(),
            ],
        }];
        let outcome = validate_grid(&grid, &columns).unwrap();
        assert_eq!(outcome.observations[0].matches("longitud mínima").count(), 1);
    }
}
