//! Read uploaded spreadsheet bytes into a normalized [`Grid`]
//!
//! Accepts `.csv`, `.xls` and `.xlsx`; anything else is rejected before a
//! single byte is parsed. Cell values map onto [`Value`] with blank strings
//! collapsed to null.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xls, Xlsx};

use crate::error::LoadError;

use super::{Grid, Value};

/// Supported upload formats, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xls,
    Xlsx,
}

impl FileKind {
    /// Detect the format from a file name; unsupported extensions are a
    /// configuration error
    pub fn from_file_name(file_name: &str) -> Result<FileKind, LoadError> {
        if file_name.trim().is_empty() {
            return Err(LoadError::config("Nombre de archivo no proporcionado"));
        }
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(FileKind::Csv),
            "xls" => Ok(FileKind::Xls),
            "xlsx" => Ok(FileKind::Xlsx),
            _ => Err(LoadError::config(
                "Formato de archivo no soportado. Usa archivos .xlsx, .xls o .csv",
            )),
        }
    }
}

/// Read raw bytes into a grid, normalize cells and drop all-blank rows
pub fn read_grid(bytes: &[u8], kind: FileKind) -> Result<Grid> {
    let mut grid = match kind {
        FileKind::Csv => read_csv(bytes)?,
        FileKind::Xls => {
            let mut workbook: Xls<_> =
                Xls::new(Cursor::new(bytes)).context("No se pudo abrir el archivo .xls")?;
            let range = first_sheet_range(&mut workbook)?;
            range_to_grid(range)?
        }
        FileKind::Xlsx => {
            let mut workbook: Xlsx<_> =
                Xlsx::new(Cursor::new(bytes)).context("No se pudo abrir el archivo .xlsx")?;
            let range = first_sheet_range(&mut workbook)?;
            range_to_grid(range)?
        }
    };
    grid.normalize();
    Ok(grid)
}

fn first_sheet_range<'a, R>(workbook: &mut R) -> Result<calamine::Range<Data>>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("El archivo no contiene hojas")?;
    workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("No se pudo leer la hoja '{}'", sheet_name))
}

fn read_csv(bytes: &[u8]) -> Result<Grid> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("No se pudo leer la fila de encabezados del CSV")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("No se pudo leer una fila del CSV")?;
        let mut row: Vec<Value> = record
            .iter()
            .take(headers.len())
            .map(|field| Value::Text(field.to_string()))
            .collect();
        row.resize(headers.len(), Value::Null);
        rows.push(row);
    }

    Ok(Grid::new(headers, rows))
}

fn range_to_grid(range: calamine::Range<Data>) -> Result<Grid> {
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_value(cell).to_text().trim().to_string())
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for data_row in rows_iter {
        let mut row: Vec<Value> = data_row
            .iter()
            .take(headers.len())
            .map(cell_to_value)
            .collect();
        row.resize(headers.len(), Value::Null);
        rows.push(row);
    }

    Ok(Grid::new(headers, rows))
}

/// Convert a calamine cell into a [`Value`]
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => {
            // Whole numbers come back as floats from Excel
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Float(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::DateTime(naive),
            None => Value::Text(dt.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

/// Strict positional header validation against the template's active column
/// names: same names, same order, same count
pub fn validate_headers(observed: &[String], expected: &[String]) -> Result<(), LoadError> {
    if observed.len() != expected.len() {
        return Err(LoadError::config(
            "El archivo no contiene la misma cantidad de columnas que la plantilla",
        ));
    }

    let missing: Vec<&String> = expected.iter().filter(|name| !observed.contains(name)).collect();
    let extra: Vec<&String> = observed.iter().filter(|name| !expected.contains(name)).collect();
    if !missing.is_empty() || !extra.is_empty() {
        let mut details = Vec::new();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|n| format!("'{}'", n)).collect();
            details.push(format!("faltan columnas: {}", names.join(", ")));
        }
        if !extra.is_empty() {
            let names: Vec<String> = extra.iter().map(|n| format!("'{}'", n)).collect();
            details.push(format!("hay columnas no esperadas: {}", names.join(", ")));
        }
        return Err(LoadError::Config(details.join("; ")));
    }

    if observed != expected {
        return Err(LoadError::config(
            "El orden de las columnas no coincide con la plantilla configurada",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_file_kind_detection() {
        assert_eq!(FileKind::from_file_name("datos.CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_file_name("datos.xlsx").unwrap(), FileKind::Xlsx);
        assert!(FileKind::from_file_name("datos.pdf").is_err());
        assert!(FileKind::from_file_name("").is_err());
    }

    #[test]
    fn test_read_csv_normalizes_cells() {
        let bytes = b"Nombre,Edad\n Ana ,30\n  ,\n,40\n";
        let grid = read_grid(bytes, FileKind::Csv).unwrap();
        assert_eq!(grid.headers, headers(&["Nombre", "Edad"]));
        // The all-blank row is dropped
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0][0], Value::Text("Ana".into()));
        assert_eq!(grid.rows[1][0], Value::Null);
        assert_eq!(grid.rows[1][1], Value::Text("40".into()));
    }

    #[test]
    fn test_read_csv_pads_short_rows() {
        let bytes = b"a,b,c\n1\n";
        let grid = read_grid(bytes, FileKind::Csv).unwrap();
        assert_eq!(grid.rows[0].len(), 3);
        assert_eq!(grid.rows[0][2], Value::Null);
    }

    #[test]
    fn test_validate_headers_exact_match() {
        let expected = headers(&["Nombre", "Edad"]);
        assert!(validate_headers(&expected, &expected).is_ok());
    }

    #[test]
    fn test_validate_headers_count_mismatch() {
        let err = validate_headers(&headers(&["Nombre"]), &headers(&["Nombre", "Edad"]))
            .unwrap_err();
        assert!(err.to_string().contains("cantidad de columnas"));
    }

    #[test]
    fn test_validate_headers_missing_and_extra() {
        let err = validate_headers(
            &headers(&["Nombre", "Correo"]),
            &headers(&["Nombre", "Edad"]),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("faltan columnas: 'Edad'"));
        assert!(message.contains("hay columnas no esperadas: 'Correo'"));
    }

    #[test]
    fn test_validate_headers_order_mismatch() {
        let err = validate_headers(
            &headers(&["Edad", "Nombre"]),
            &headers(&["Nombre", "Edad"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("orden de las columnas"));
    }

    #[test]
    fn test_validate_headers_casing_difference_fails() {
        let err = validate_headers(&headers(&["nombre"]), &headers(&["Nombre"])).unwrap_err();
        assert!(err.to_string().contains("faltan columnas"));
    }
}
