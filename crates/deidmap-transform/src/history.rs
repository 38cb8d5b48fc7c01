//! Layout of the shared mapping history.
//!
//! One history directory holds one bare remote per store
//! (`<surrogate_column>.git` and `offset_days.git`). Working copies live
//! under an explicit, caller-owned work root; no ambient scratch
//! directories.

use deidmap_store::records::{RecordFile, RecordFileError, find_record_file, read_record_file};
use deidmap_store::{DateOffsetStore, MappingStore, OFFSET_COLUMN};
use deidmap_vcs::{GitRepository, RepositoryError, init_bare};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors from history management.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("file history {0} already exists; pass overwrite to recreate it")]
    Exists(String),

    #[error("{0}: {1}")]
    Io(String, String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Records(#[from] RecordFileError),
}

/// The pair of directories every operation needs: where the shared bare
/// remotes live, and where this process keeps its working copies.
#[derive(Debug, Clone)]
pub struct HistoryLayout {
    history: PathBuf,
    work_root: PathBuf,
}

impl HistoryLayout {
    pub fn new(history: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            history: history.into(),
            work_root: work_root.into(),
        }
    }

    pub fn history(&self) -> &Path {
        &self.history
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    fn remote_for(&self, name: &str) -> String {
        self.history.join(format!("{name}.git")).display().to_string()
    }

    fn open_repo(&self, name: &str) -> Result<GitRepository, RepositoryError> {
        GitRepository::open(self.work_root.join(name), self.remote_for(name))
    }

    /// Open the mapping store for `surrogate_column`.
    pub fn mapping_store(&self, surrogate_column: &str) -> Result<MappingStore, RepositoryError> {
        Ok(MappingStore::new(self.open_repo(surrogate_column)?))
    }

    /// Open the date-offset store.
    pub fn offset_store(&self) -> Result<DateOffsetStore, RepositoryError> {
        Ok(DateOffsetStore::new(self.open_repo(OFFSET_COLUMN)?))
    }

    /// Read one store's record file at the latest published state,
    /// without needing a pool. `None` when the store is still empty.
    pub fn store_snapshot(&self, name: &str) -> Result<Option<RecordFile>, HistoryError> {
        let repo = self.open_repo(name)?;
        repo.sync()?;
        match find_record_file(repo.work_dir())? {
            Some(path) => Ok(read_record_file(&path)?),
            None => Ok(None),
        }
    }

    /// Create the bare remotes for both stores.
    ///
    /// Refuses to touch an existing history unless `overwrite` is set,
    /// in which case the old remote is removed and recreated empty.
    pub fn init(&self, surrogate_column: &str, overwrite: bool) -> Result<Vec<PathBuf>, HistoryError> {
        let mut created = Vec::new();
        for name in [surrogate_column, OFFSET_COLUMN] {
            let bare = self.history.join(format!("{name}.git"));
            if bare.exists() {
                if !overwrite {
                    return Err(HistoryError::Exists(bare.display().to_string()));
                }
                info!(path = %bare.display(), "overwriting existing file history");
                fs::remove_dir_all(&bare)
                    .map_err(|e| HistoryError::Io(bare.display().to_string(), e.to_string()))?;
            }
            init_bare(&bare)?;
            created.push(bare);
        }
        Ok(created)
    }
}
