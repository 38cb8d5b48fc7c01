//! Identifier pools: pre-generated surrogate ids read from a flat file.
//!
//! The pool file is a single column: the header names the surrogate-id
//! column used in downstream mappings, the body is one checksum-valid
//! identifier per line. Order is the allocation order.

use deidmap_checksum::{SurrogateId, SurrogateIdError};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Errors from loading a pool file.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool file {0}: {1}")]
    Io(String, String),

    #[error("pool file {0} is empty (missing header line)")]
    Empty(String),

    #[error("pool file {file} line {line}: identifier may not contain {found:?}")]
    Separator { file: String, line: usize, found: char },

    #[error("pool file {file} line {line}: {source}")]
    Invalid {
        file: String,
        line: usize,
        source: SurrogateIdError,
    },

    #[error("pool file {file} line {line}: duplicate identifier {id}")]
    Duplicate { file: String, line: usize, id: String },
}

/// An ordered, duplicate-free set of candidate surrogate identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierPool {
    column: String,
    ids: Vec<SurrogateId>,
}

impl IdentifierPool {
    /// Load and validate a pool file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|e| PoolError::Io(display.clone(), e.to_string()))?;

        let mut column = None;
        let mut ids = Vec::new();
        let mut seen = BTreeSet::new();
        for (line_no, line) in text.lines().enumerate() {
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            if let Some(found) = entry.chars().find(|c| *c == ',' || *c == '\t') {
                return Err(PoolError::Separator {
                    file: display,
                    line: line_no + 1,
                    found,
                });
            }
            match &column {
                None => column = Some(entry.to_string()),
                Some(_) => {
                    let id = SurrogateId::parse(entry).map_err(|source| PoolError::Invalid {
                        file: display.clone(),
                        line: line_no + 1,
                        source,
                    })?;
                    if !seen.insert(id.as_str().to_string()) {
                        return Err(PoolError::Duplicate {
                            file: display,
                            line: line_no + 1,
                            id: entry.to_string(),
                        });
                    }
                    ids.push(id);
                }
            }
        }

        let column = column.ok_or(PoolError::Empty(display))?;
        Ok(Self { column, ids })
    }

    /// Build a pool directly from verified identifiers (used by id
    /// generation and tests).
    pub fn from_ids(column: impl Into<String>, ids: Vec<SurrogateId>) -> Self {
        Self {
            column: column.into(),
            ids,
        }
    }

    /// Name of the surrogate-id column, taken from the file header.
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SurrogateId> {
        self.ids.iter()
    }

    /// Identifiers not yet consumed, in pool-file order.
    ///
    /// Deterministic given the same pool and exclusion set, which is what
    /// makes allocation reproducible.
    pub fn available<'a>(&'a self, used: &BTreeSet<String>) -> Vec<&'a SurrogateId> {
        self.ids
            .iter()
            .filter(|id| !used.contains(id.as_str()))
            .collect()
    }
}
