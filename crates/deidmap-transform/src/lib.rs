//! # deidmap-transform
//!
//! Orchestration layer: the in-memory table model and the
//! deidentification transforms over it.
//!
//! ```text
//! caller table (local ids, raw dates)
//!     │ replace_ids          MappingStore ── VersionedRepository
//!     │ shift_dates          DateOffsetStore ── VersionedRepository
//!     ▼
//! transformed table (surrogate ids, shifted YYYYMMDD dates)
//! ```
//!
//! Each store call the transforms make is one full sync/commit/publish
//! cycle; a failure anywhere produces no output table and leaves the
//! persisted stores untouched.

pub mod deidentify;
pub mod history;
pub mod io;
pub mod table;

pub use deidentify::{
    SHIFTED_DATE_FORMAT, TransformError, combined_mappings, deidentify, replace_ids, shift_dates,
    shifted_column_name,
};
pub use history::{HistoryError, HistoryLayout};
pub use io::{TableIoError, read_table, write_table};
pub use table::{Table, TableError};
