//! The mapping store: local id -> surrogate id, allocate-if-absent.
//!
//! The store as a whole is a partial bijection from local ids onto a
//! subset of the identifier pool. Records are created exactly once and
//! never mutated or deleted; mappings must stay stable for the life of a
//! study.

use crate::pool::IdentifierPool;
use crate::records::{RecordFile, read_record_file, write_record_file};
use crate::StoreError;
use deidmap_checksum::SurrogateId;
use deidmap_vcs::GitRepository;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Persistent bijective mapping backed by one versioned repository.
#[derive(Debug)]
pub struct MappingStore {
    repo: GitRepository,
}

impl MappingStore {
    pub fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    /// Resolve surrogate ids for `local_ids`, allocating where absent.
    ///
    /// Unmapped ids are sorted lexicographically and zipped with the
    /// first available pool entries, so allocation is a pure function of
    /// the unmapped *set* and the pool, independent of input row order.
    /// Either every unmapped id is allocated, committed and published, or
    /// none is.
    pub fn resolve(
        &self,
        pool: &IdentifierPool,
        local_column: &str,
        local_ids: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, SurrogateId>, StoreError> {
        let file_name = format!("{}.csv", pool.column());
        let message = format!(
            "deidmap: resolve {} local id(s) against {}",
            local_ids.len(),
            file_name
        );

        self.repo.transact(&message, |work_dir| {
            let path = work_dir.join(&file_name);
            let mut file = load_mapping_file(&path, local_column, pool)?;

            let (mapped, used) = index_records(&path, &file)?;
            let unmapped: Vec<&String> = local_ids
                .iter()
                .filter(|id| !mapped.contains_key(id.as_str()))
                .collect();
            if unmapped.is_empty() {
                return Ok(());
            }

            let available = pool.available(&used);
            if available.len() < unmapped.len() {
                return Err(StoreError::InsufficientIdentifiers {
                    needed: unmapped.len(),
                    available: available.len(),
                });
            }

            for (local, surrogate) in unmapped.iter().zip(&available) {
                file.records
                    .push(((*local).clone(), surrogate.as_str().to_string()));
            }
            write_record_file(&path, &file)?;
            info!(
                allocated = unmapped.len(),
                store = %file_name,
                "allocated surrogate ids"
            );
            Ok(())
        })?;

        // Re-read the now-published mapping and return the requested
        // subset.
        let path = self.repo.work_dir().join(&file_name);
        let file = load_mapping_file(&path, local_column, pool)?;
        let (mapped, _) = index_records(&path, &file)?;
        let mut resolved = BTreeMap::new();
        for local in local_ids {
            let surrogate = mapped.get(local.as_str()).cloned().ok_or_else(|| {
                StoreError::CorruptStore {
                    file: path.display().to_string(),
                    detail: format!("local id {local:?} missing after allocation"),
                }
            })?;
            resolved.insert(local.clone(), surrogate);
        }
        Ok(resolved)
    }

    /// Synchronize and return every record currently published.
    pub fn snapshot(&self, pool: &IdentifierPool, local_column: &str) -> Result<RecordFile, StoreError> {
        self.repo.sync()?;
        let path = self.repo.work_dir().join(format!("{}.csv", pool.column()));
        load_mapping_file(&path, local_column, pool)
    }
}

/// Read the mapping file, enforcing header agreement. An absent file is
/// an empty store with the expected header.
fn load_mapping_file(
    path: &Path,
    local_column: &str,
    pool: &IdentifierPool,
) -> Result<RecordFile, StoreError> {
    match read_record_file(path)? {
        Some(file) => {
            if file.header.0 != local_column || file.header.1 != pool.column() {
                return Err(StoreError::CorruptStore {
                    file: path.display().to_string(),
                    detail: format!(
                        "header ({},{}) does not match expected ({local_column},{})",
                        file.header.0,
                        file.header.1,
                        pool.column()
                    ),
                });
            }
            Ok(file)
        }
        None => Ok(RecordFile::new(local_column, pool.column())),
    }
}

/// Index records by local id, enforcing the store-level invariants:
/// each local id mapped at most once, each surrogate consumed at most
/// once, every stored surrogate checksum-valid.
fn index_records(
    path: &Path,
    file: &RecordFile,
) -> Result<(BTreeMap<String, SurrogateId>, BTreeSet<String>), StoreError> {
    let mut mapped = BTreeMap::new();
    let mut used = BTreeSet::new();
    for (local, surrogate) in &file.records {
        let surrogate = SurrogateId::parse(surrogate).map_err(|e| StoreError::CorruptStore {
            file: path.display().to_string(),
            detail: e.to_string(),
        })?;
        if mapped.insert(local.clone(), surrogate.clone()).is_some() {
            return Err(StoreError::CorruptStore {
                file: path.display().to_string(),
                detail: format!("local id {local:?} is mapped more than once"),
            });
        }
        if !used.insert(surrogate.as_str().to_string()) {
            return Err(StoreError::CorruptStore {
                file: path.display().to_string(),
                detail: format!("surrogate id {surrogate} is consumed more than once"),
            });
        }
    }
    Ok((mapped, used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deidmap_checksum::{GenerateIds, generate_ids};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "deidmap-mapping-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        path
    }

    fn store_at(root: &Path) -> MappingStore {
        let remote = root.join("jdc_person_id.git").display().to_string();
        let repo = GitRepository::open(root.join("work"), remote).expect("repo should open");
        MappingStore::new(repo)
    }

    fn pool_of(n: u64) -> IdentifierPool {
        let ids = generate_ids(&GenerateIds {
            count: n,
            prefix: "J".to_string(),
            offset: 100000,
            length: Some(8),
        })
        .expect("ids should generate");
        IdentifierPool::from_ids("jdc_person_id", ids)
    }

    fn set_of(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_allocates_in_lexicographic_order_of_local_ids() {
        let root = temp_dir("lexi");
        let store = store_at(&root);
        let pool = pool_of(4);

        let resolved = store
            .resolve(&pool, "record_id", &set_of(&["B", "A"]))
            .expect("resolve should succeed");

        let first_pool_id: Vec<&SurrogateId> = pool.ids().take(2).collect();
        assert_eq!(resolved["A"], *first_pool_id[0]);
        assert_eq!(resolved["B"], *first_pool_id[1]);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn resolve_is_idempotent() {
        let root = temp_dir("idem");
        let store = store_at(&root);
        let pool = pool_of(4);
        let ids = set_of(&["A", "B"]);

        let first = store.resolve(&pool, "record_id", &ids).expect("first resolve");
        let second = store.resolve(&pool, "record_id", &ids).expect("second resolve");
        assert_eq!(first, second);

        let file = store
            .snapshot(&pool, "record_id")
            .expect("snapshot should read");
        assert_eq!(file.records.len(), 2);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn resolve_never_reuses_a_surrogate_across_calls() {
        let root = temp_dir("bijective");
        let store = store_at(&root);
        let pool = pool_of(6);

        let first = store
            .resolve(&pool, "record_id", &set_of(&["A", "B"]))
            .expect("first resolve");
        let second = store
            .resolve(&pool, "record_id", &set_of(&["B", "C", "D"]))
            .expect("second resolve");

        assert_eq!(first["B"], second["B"]);
        let mut issued: Vec<&str> = first.values().chain(second.values()).map(SurrogateId::as_str).collect();
        issued.sort_unstable();
        issued.dedup();
        assert_eq!(issued.len(), 4, "four distinct locals need four distinct surrogates");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn pool_exhaustion_leaves_zero_new_records() {
        let root = temp_dir("exhaust");
        let store = store_at(&root);
        let pool = pool_of(2);

        let err = store
            .resolve(&pool, "record_id", &set_of(&["A", "B", "C"]))
            .expect_err("exhausted pool must fail");
        assert!(matches!(err, StoreError::InsufficientIdentifiers { needed: 3, available: 2 }));

        let file = store
            .snapshot(&pool, "record_id")
            .expect("snapshot should read");
        assert!(file.records.is_empty(), "no partial allocation may be committed");
        assert_eq!(store.repo().commit_count().expect("count"), 0);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn duplicate_local_id_in_store_is_corrupt() {
        let root = temp_dir("corrupt");
        let store = store_at(&root);
        let pool = pool_of(2);

        store
            .resolve(&pool, "record_id", &set_of(&["A"]))
            .expect("seed resolve");
        // Tamper with the published file the way a bad manual merge would.
        let path = store.repo().work_dir().join("jdc_person_id.csv");
        let mut text = fs::read_to_string(&path).expect("mapping file should read");
        let dup = text.lines().nth(1).expect("record line").to_string();
        text.push_str(&dup);
        text.push('\n');
        fs::write(&path, text).expect("tamper write");
        store.repo().commit("tampered").expect("commit");
        store.repo().publish().expect("publish");

        let err = store
            .resolve(&pool, "record_id", &set_of(&["B"]))
            .expect_err("corrupt store must be fatal");
        match err {
            StoreError::CorruptStore { detail, .. } => {
                assert!(detail.contains("mapped more than once"))
            }
            other => panic!("expected corrupt store, got {other:?}"),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn header_mismatch_is_corrupt() {
        let root = temp_dir("header");
        let store = store_at(&root);
        let pool = pool_of(2);
        store
            .resolve(&pool, "record_id", &set_of(&["A"]))
            .expect("seed resolve");

        let err = store
            .resolve(&pool, "participant_id", &set_of(&["B"]))
            .expect_err("header mismatch must be fatal");
        assert!(matches!(err, StoreError::CorruptStore { .. }));
        let _ = fs::remove_dir_all(root);
    }
}
