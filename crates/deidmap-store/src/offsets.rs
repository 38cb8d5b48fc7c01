//! The date-offset store: one immutable random day offset per subject.
//!
//! Offsets are drawn once, uniformly and symmetrically around zero, and
//! are never redrawn: every date column for a subject shifts by the same
//! amount, in every invocation, on every collaborator's machine.

use crate::records::{RecordFile, read_record_file, write_record_file};
use crate::StoreError;
use deidmap_vcs::GitRepository;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// File name of the offset store inside its repository.
pub const OFFSET_FILE: &str = "offset_days.csv";

/// Name of the offset column.
pub const OFFSET_COLUMN: &str = "offset_days";

/// Default shift window: offsets drawn from [-182, +182] days, roughly
/// half a year either way.
pub const DEFAULT_SHIFT_WINDOW_DAYS: i64 = 364;

/// Persistent per-subject day offsets backed by one versioned repository.
#[derive(Debug)]
pub struct DateOffsetStore {
    repo: GitRepository,
    window_days: i64,
}

impl DateOffsetStore {
    pub fn new(repo: GitRepository) -> Self {
        Self {
            repo,
            window_days: DEFAULT_SHIFT_WINDOW_DAYS,
        }
    }

    /// Override the shift window (total width in days).
    pub fn with_window(mut self, window_days: i64) -> Self {
        self.window_days = window_days;
        self
    }

    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Resolve offsets for `local_ids`, drawing for ids not yet present.
    ///
    /// The same transactional cycle as the mapping store; there is no
    /// exhaustion failure mode, but the idempotence and atomic-commit
    /// guarantees are identical. Ids already present are never redrawn.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        local_column: &str,
        local_ids: &BTreeSet<String>,
        rng: &mut R,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        let message = format!(
            "deidmap: resolve {} day offset(s) in {OFFSET_FILE}",
            local_ids.len()
        );
        let half = self.window_days / 2;

        self.repo.transact(&message, |work_dir| -> Result<(), StoreError> {
            let path = work_dir.join(OFFSET_FILE);
            let mut file = load_offset_file(&path, local_column)?;
            let known = index_records(&path, &file)?;

            let unmapped: Vec<&String> = local_ids
                .iter()
                .filter(|id| !known.contains_key(id.as_str()))
                .collect();
            if unmapped.is_empty() {
                return Ok(());
            }

            // Sorted iteration makes seeded draws reproducible.
            for local in &unmapped {
                let offset: i64 = rng.gen_range(-half..=half);
                file.records.push(((*local).clone(), offset.to_string()));
            }
            write_record_file(&path, &file)?;
            info!(drawn = unmapped.len(), "drew day offsets");
            Ok(())
        })?;

        let path = self.repo.work_dir().join(OFFSET_FILE);
        let file = load_offset_file(&path, local_column)?;
        let known = index_records(&path, &file)?;
        let mut resolved = BTreeMap::new();
        for local in local_ids {
            let offset = known.get(local.as_str()).copied().ok_or_else(|| {
                StoreError::CorruptStore {
                    file: path.display().to_string(),
                    detail: format!("local id {local:?} missing after draw"),
                }
            })?;
            resolved.insert(local.clone(), offset);
        }
        Ok(resolved)
    }

    /// Synchronize and return every record currently published.
    pub fn snapshot(&self, local_column: &str) -> Result<RecordFile, StoreError> {
        self.repo.sync()?;
        let path = self.repo.work_dir().join(OFFSET_FILE);
        load_offset_file(&path, local_column)
    }
}

fn load_offset_file(path: &Path, local_column: &str) -> Result<RecordFile, StoreError> {
    match read_record_file(path)? {
        Some(file) => {
            if file.header.0 != local_column || file.header.1 != OFFSET_COLUMN {
                return Err(StoreError::CorruptStore {
                    file: path.display().to_string(),
                    detail: format!(
                        "header ({},{}) does not match expected ({local_column},{OFFSET_COLUMN})",
                        file.header.0, file.header.1
                    ),
                });
            }
            Ok(file)
        }
        None => Ok(RecordFile::new(local_column, OFFSET_COLUMN)),
    }
}

fn index_records(path: &Path, file: &RecordFile) -> Result<BTreeMap<String, i64>, StoreError> {
    let mut known = BTreeMap::new();
    for (local, offset) in &file.records {
        let offset: i64 = offset.parse().map_err(|e| StoreError::CorruptStore {
            file: path.display().to_string(),
            detail: format!("offset {offset:?} for local id {local:?} is not an integer: {e}"),
        })?;
        if known.insert(local.clone(), offset).is_some() {
            return Err(StoreError::CorruptStore {
                file: path.display().to_string(),
                detail: format!("local id {local:?} has more than one offset"),
            });
        }
    }
    Ok(known)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "deidmap-offsets-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        path
    }

    fn store_at(root: &Path) -> DateOffsetStore {
        let remote = root.join("offset_days.git").display().to_string();
        let repo = GitRepository::open(root.join("work"), remote).expect("repo should open");
        DateOffsetStore::new(repo)
    }

    fn set_of(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn offsets_stay_inside_the_window() {
        let root = temp_dir("window");
        let store = store_at(&root).with_window(100);
        let mut rng = StdRng::seed_from_u64(7);
        let ids: Vec<String> = (0..40).map(|i| format!("id-{i:02}")).collect();
        let id_set: BTreeSet<String> = ids.iter().cloned().collect();

        let resolved = store
            .resolve("record_id", &id_set, &mut rng)
            .expect("resolve should succeed");
        assert_eq!(resolved.len(), 40);
        assert!(resolved.values().all(|o| (-50..=50).contains(o)));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn resolve_never_redraws_a_known_id() {
        let root = temp_dir("stable");
        let store = store_at(&root);
        let mut rng = StdRng::seed_from_u64(2);

        let first = store
            .resolve("record_id", &set_of(&["X"]), &mut rng)
            .expect("first resolve");
        // A different RNG state must not matter for an id already drawn.
        let mut other_rng = StdRng::seed_from_u64(99);
        let second = store
            .resolve("record_id", &set_of(&["X", "Y"]), &mut other_rng)
            .expect("second resolve");

        assert_eq!(first["X"], second["X"]);
        let file = store.snapshot("record_id").expect("snapshot");
        assert_eq!(file.records.len(), 2);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let root_a = temp_dir("seed-a");
        let root_b = temp_dir("seed-b");
        let ids = set_of(&["A", "B", "C"]);

        let a = store_at(&root_a)
            .resolve("record_id", &ids, &mut StdRng::seed_from_u64(42))
            .expect("resolve a");
        let b = store_at(&root_b)
            .resolve("record_id", &ids, &mut StdRng::seed_from_u64(42))
            .expect("resolve b");
        assert_eq!(a, b);

        let _ = fs::remove_dir_all(root_a);
        let _ = fs::remove_dir_all(root_b);
    }

    #[test]
    fn non_integer_offset_is_corrupt() {
        let root = temp_dir("corrupt");
        let store = store_at(&root);
        let mut rng = StdRng::seed_from_u64(1);
        store
            .resolve("record_id", &set_of(&["A"]), &mut rng)
            .expect("seed resolve");

        let path = store.repo().work_dir().join(OFFSET_FILE);
        let mut text = fs::read_to_string(&path).expect("offset file should read");
        text.push_str("B,not-a-number\n");
        fs::write(&path, text).expect("tamper write");
        store.repo().commit("tampered").expect("commit");
        store.repo().publish().expect("publish");

        let err = store
            .resolve("record_id", &set_of(&["C"]), &mut rng)
            .expect_err("corrupt store must be fatal");
        assert!(matches!(err, StoreError::CorruptStore { .. }));
        let _ = fs::remove_dir_all(root);
    }
}
