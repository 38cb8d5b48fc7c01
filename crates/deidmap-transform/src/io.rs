//! Thin CSV read/write for tables.
//!
//! This is CLI plumbing, not the store format: one header line, naive
//! comma-separated cells, empty cell = null. Cells containing commas or
//! line breaks are rejected on write rather than quoted; identifiers and
//! dates never need them.

use crate::table::{Table, TableError};
use std::fs;
use std::path::Path;

/// Errors from table file I/O.
#[derive(Debug, thiserror::Error)]
pub enum TableIoError {
    #[error("{0}: {1}")]
    Io(String, String),

    #[error("{file} line {line}: expected {expected} cells, found {found}")]
    Shape {
        file: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{0} is empty (missing header line)")]
    Empty(String),

    #[error("cell {0:?} cannot be written (commas and line breaks are not supported)")]
    Cell(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Read a table from a CSV file.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table, TableIoError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let text =
        fs::read_to_string(path).map_err(|e| TableIoError::Io(display.clone(), e.to_string()))?;

    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(TableIoError::Empty(display.clone()))?;
    let columns: Vec<String> = header.split(',').map(str::to_string).collect();
    let width = columns.len();
    let mut table = Table::new(columns)?;

    for (line_no, line) in lines {
        let cells: Vec<Option<String>> = line
            .split(',')
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        if cells.len() != width {
            return Err(TableIoError::Shape {
                file: display,
                line: line_no + 1,
                expected: width,
                found: cells.len(),
            });
        }
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Write a table to a CSV file.
pub fn write_table(path: impl AsRef<Path>, table: &Table) -> Result<(), TableIoError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let mut out = String::new();
    for (i, column) in table.columns().iter().enumerate() {
        validate_cell(column)?;
        if i > 0 {
            out.push(',');
        }
        out.push_str(column);
    }
    out.push('\n');
    for row in table.rows() {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            if let Some(value) = cell {
                validate_cell(value)?;
                out.push_str(value);
            }
        }
        out.push('\n');
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| TableIoError::Io(parent.display().to_string(), e.to_string()))?;
    }
    fs::write(path, out).map_err(|e| TableIoError::Io(display, e.to_string()))
}

fn validate_cell(value: &str) -> Result<(), TableIoError> {
    if value.contains(',') || value.contains('\n') || value.contains('\r') {
        return Err(TableIoError::Cell(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "deidmap-tableio-{prefix}-{}-{unique}.csv",
            std::process::id()
        ))
    }

    #[test]
    fn round_trips_nulls_as_empty_cells() {
        let path = temp_path("roundtrip");
        let mut table =
            Table::new(vec!["record_id".to_string(), "date_var".to_string()]).expect("table");
        table
            .push_row(vec![Some("1".to_string()), None])
            .expect("row");
        table
            .push_row(vec![Some("2".to_string()), Some("2023-06-15".to_string())])
            .expect("row");
        write_table(&path, &table).expect("write should succeed");

        let read = read_table(&path).expect("read should succeed");
        assert_eq!(read, table);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_rejects_ragged_rows() {
        let path = temp_path("ragged");
        fs::write(&path, "a,b\n1\n").expect("fixture should write");
        let err = read_table(&path).expect_err("ragged row must fail");
        assert!(matches!(err, TableIoError::Shape { line: 2, .. }));
        let _ = fs::remove_file(path);
    }
}
