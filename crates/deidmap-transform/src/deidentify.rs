//! The deidentification transforms.
//!
//! `replace_ids` swaps the local-id column for checksum-valid surrogate
//! ids; `shift_dates` moves every date cell by the subject's fixed day
//! offset. Both lean entirely on the stores for persistence, so a failed
//! call leaves no trace in the shared history.

use crate::table::{Table, TableError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use deidmap_store::records::RecordFile;
use deidmap_store::{DateOffsetStore, IdentifierPool, MappingStore, StoreError};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Serialized form of every shifted date, decoupled from input formats.
pub const SHIFTED_DATE_FORMAT: &str = "%Y%m%d";

/// Errors from the transform layer.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("row {row} column {column:?}: date {value:?} is not in a supported format")]
    UnparseableDate {
        row: usize,
        column: String,
        value: String,
    },

    #[error(
        "row {row} column {column:?}: date present but {id_column:?} is null, no offset applies"
    )]
    MissingSubject {
        row: usize,
        column: String,
        id_column: String,
    },

    #[error("store file keyed on {0:?} joins none of the combined columns {1:?}")]
    KeyMismatch(String, String),

    #[error("no store files to combine")]
    NoStores,
}

/// Name a date column takes after shifting.
pub fn shifted_column_name(column: &str) -> String {
    format!("shifted_{column}")
}

/// Replace local ids with surrogate ids from the pool.
///
/// Every distinct non-null value of `id_column` is resolved through the
/// mapping store (allocating where absent); the column's values are
/// replaced in place and the column is renamed to the pool header name.
/// Null ids pass through as null.
pub fn replace_ids(
    mut table: Table,
    id_column: &str,
    pool: &IdentifierPool,
    store: &MappingStore,
) -> Result<Table, TransformError> {
    let index = table.require_column(id_column)?;
    let local_ids = table.distinct_non_null(id_column)?;
    let resolved = store.resolve(pool, id_column, &local_ids)?;

    for row in 0..table.len() {
        let replacement = match table.cell(row, index) {
            Some(local) => resolved.get(local).map(|s| s.as_str().to_string()),
            None => None,
        };
        table.set_cell(row, index, replacement);
    }
    table.rename_column(id_column, pool.column())?;
    Ok(table)
}

/// Shift every date cell by its subject's fixed day offset.
///
/// Offsets are resolved (drawing for unseen subjects) once for the whole
/// table; each listed date column is shifted cell by cell, re-serialized
/// as `YYYYMMDD`, and renamed `shifted_<name>`. A listed column missing
/// from the table is skipped with a warning. Null dates pass through; a
/// non-null date on a row with a null id is an error, since no offset
/// can apply and passing the real date through would defeat the point.
pub fn shift_dates<R: Rng + ?Sized>(
    mut table: Table,
    id_column: &str,
    date_columns: &[String],
    store: &DateOffsetStore,
    rng: &mut R,
) -> Result<Table, TransformError> {
    let id_index = table.require_column(id_column)?;
    let local_ids = table.distinct_non_null(id_column)?;
    let offsets = store.resolve(id_column, &local_ids, rng)?;

    for column in dedup_columns(date_columns) {
        let Some(index) = table.column_index(&column) else {
            warn!(column = %column, "date column not present in table, skipping");
            continue;
        };

        for row in 0..table.len() {
            let Some(value) = table.cell(row, index).map(str::to_string) else {
                continue;
            };
            let local = table.cell(row, id_index).ok_or_else(|| {
                TransformError::MissingSubject {
                    row,
                    column: column.clone(),
                    id_column: id_column.to_string(),
                }
            })?;
            // Resolution covered every distinct non-null id.
            let offset = offsets[local];
            let date = parse_date(&value).ok_or_else(|| TransformError::UnparseableDate {
                row,
                column: column.clone(),
                value: value.clone(),
            })?;
            let shifted = date + Duration::days(offset);
            table.set_cell(
                row,
                index,
                Some(shifted.format(SHIFTED_DATE_FORMAT).to_string()),
            );
        }
        table.rename_column(&column, &shifted_column_name(&column))?;
    }
    Ok(table)
}

/// Run both deidentification steps.
///
/// After id replacement the table is keyed by the surrogate column, so
/// the date shift (and the offset store) is keyed by surrogate id.
pub fn deidentify<R: Rng + ?Sized>(
    table: Table,
    id_column: &str,
    date_columns: &[String],
    pool: &IdentifierPool,
    mapping_store: &MappingStore,
    offset_store: &DateOffsetStore,
    rng: &mut R,
) -> Result<Table, TransformError> {
    let table = replace_ids(table, id_column, pool, mapping_store)?;
    shift_dates(table, pool.column(), date_columns, offset_store, rng)
}

/// Outer-join store files into one convenience table for operators (not
/// version-controlled).
///
/// Files join in order: each file's key column must already be one of
/// the combined columns, so a local-to-surrogate mapping chains with a
/// surrogate-keyed offset file. Keys with no match on either side still
/// get a row, with nulls for the columns they lack.
pub fn combined_mappings(files: &[&RecordFile]) -> Result<Table, TransformError> {
    let mut iter = files.iter();
    let first = iter.next().ok_or(TransformError::NoStores)?;

    let mut columns = vec![first.header.0.clone(), first.header.1.clone()];
    let mut rows: Vec<Vec<Option<String>>> = first
        .records
        .iter()
        .map(|(k, v)| vec![Some(k.clone()), Some(v.clone())])
        .collect();

    for file in iter {
        let join = columns
            .iter()
            .position(|c| *c == file.header.0)
            .ok_or_else(|| {
                TransformError::KeyMismatch(file.header.0.clone(), columns.join(", "))
            })?;
        let index: BTreeMap<&str, &str> = file
            .records
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut unmatched: BTreeSet<String> = index.keys().map(|k| k.to_string()).collect();

        for row in &mut rows {
            let value = row[join]
                .as_deref()
                .and_then(|key| index.get(key).copied())
                .map(str::to_string);
            if let Some(key) = row[join].as_deref() {
                unmatched.remove(key);
            }
            row.push(value);
        }
        for key in unmatched {
            let mut row = vec![None; columns.len()];
            let value = index.get(key.as_str()).map(|v| v.to_string());
            row[join] = Some(key);
            row.push(value);
            rows.push(row);
        }
        columns.push(file.header.1.clone());
    }

    let mut table = Table::new(columns)?;
    for row in rows {
        table.push_row(row)?;
    }
    Ok(table)
}

fn dedup_columns(columns: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    columns
        .iter()
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect()
}

/// Parse a date cell. Several input spellings are accepted; time-of-day,
/// if present, is dropped — only day-level shifting is guaranteed.
fn parse_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    let value = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    None
}
