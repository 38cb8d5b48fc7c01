//! The in-memory table the transforms operate on.
//!
//! Columns are addressed by name only: the caller always names the
//! column holding the local id, and there is deliberately no positional
//! or index-level fallback. Cells are `Option<String>`; `None` is an
//! absent value and survives every transform unchanged.

use std::collections::BTreeSet;

/// Errors from table construction and access.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column {0:?} not found in table")]
    ColumnNotFound(String),

    #[error("column {0:?} already exists in table")]
    DuplicateColumn(String),

    #[error("row has {found} cells, table has {expected} columns")]
    RowShape { expected: usize, found: usize },
}

/// A rectangular table with named columns and nullable string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowShape {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// Rename a column in place. The new name must not collide.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        if from == to {
            return Ok(());
        }
        if self.column_index(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        let index = self.require_column(from)?;
        self.columns[index] = to.to_string();
        Ok(())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<String>]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Option<String>) {
        if let Some(r) = self.rows.get_mut(row)
            && let Some(cell) = r.get_mut(column)
        {
            *cell = value;
        }
    }

    /// Distinct non-null values of one column, sorted.
    pub fn distinct_non_null(&self, name: &str) -> Result<BTreeSet<String>, TableError> {
        let index = self.require_column(name)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row[index].clone())
            .collect())
    }

    /// Values of one column in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&str>>, TableError> {
        let index = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[index].as_deref()).collect())
    }
}
