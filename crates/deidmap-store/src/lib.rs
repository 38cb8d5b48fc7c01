//! # deidmap-store
//!
//! Persistence layer for deidentification mappings.
//!
//! This crate provides:
//! - two-column record files (the on-disk store format)
//! - `IdentifierPool` (pre-generated surrogate ids, checksum-validated)
//! - `MappingStore` (local id -> surrogate id, a partial bijection)
//! - `DateOffsetStore` (local id -> immutable per-subject day offset)
//!
//! Every store call is one full read-modify-write-commit-publish cycle
//! against a [`deidmap_vcs::GitRepository`]; allocation is re-derived
//! from the freshly synchronized state on every call, which is what makes
//! retries idempotent.

pub mod mapping;
pub mod offsets;
pub mod pool;
pub mod records;

pub use mapping::MappingStore;
pub use offsets::{DEFAULT_SHIFT_WINDOW_DAYS, DateOffsetStore, OFFSET_COLUMN, OFFSET_FILE};
pub use pool::{IdentifierPool, PoolError};
pub use records::{RecordFile, RecordFileError, find_record_file, read_record_file, write_record_file};

use deidmap_vcs::RepositoryError;

/// Errors raised by store operations.
///
/// `Repository(Synchronization)` is retryable by re-invoking the whole
/// operation; everything else is fatal and requires operator action.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Records(#[from] RecordFileError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(
        "identifier pool exhausted: {needed} unmapped id(s) but only {available} identifier(s) available"
    )]
    InsufficientIdentifiers { needed: usize, available: usize },

    #[error("corrupt store file {file}: {detail}; the store is never auto-repaired")]
    CorruptStore { file: String, detail: String },
}

impl StoreError {
    /// Whether re-invoking the failed operation can succeed without
    /// operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Repository(RepositoryError::Synchronization { .. })
        )
    }
}
