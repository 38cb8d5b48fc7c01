//! Git adapter for the versioned mapping repositories.
//!
//! This crate is intentionally thin: it shells out to `git` and exposes
//! exactly the open/sync/commit/publish/rollback protocol the stores
//! need. No mapping semantics live here.
//!
//! The remote is the shared serialization point across collaborators: a
//! non-fast-forward push rejection surfaces as [`RepositoryError::Synchronization`]
//! after the local state has been rolled back, so a reader on another
//! machine never observes a commit that failed to publish.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Errors from interacting with a versioned repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("git executable is not available in PATH")]
    NotInstalled,

    #[error("git command failed: git {args} ({message})")]
    CommandFailed { args: String, message: String },

    #[error(
        "working copy {work_dir} holds unpublished local changes from an earlier run; \
         inspect and resolve it manually before retrying"
    )]
    DirtyWorkingCopy { work_dir: String },

    #[error("working copy {work_dir} is configured for remote {found}, expected {expected}")]
    RemoteMismatch {
        work_dir: String,
        expected: String,
        found: String,
    },

    #[error("failed to synchronize with remote {remote}: {message}")]
    Synchronization { remote: String, message: String },

    #[error("unable to parse git output: {0}")]
    Parse(String),
}

/// A working copy bound to one bare remote.
///
/// One store owns one `GitRepository` for the duration of one operation.
/// The work directory is private to this process; the remote is the
/// shared resource.
#[derive(Debug, Clone)]
pub struct GitRepository {
    work_dir: PathBuf,
    remote: String,
}

impl GitRepository {
    /// Returns true if `git` is available in PATH.
    pub fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Open or create a working copy for `remote` at `work_dir`.
    ///
    /// An existing work dir must already point at `remote`. A missing
    /// work dir is cloned from the remote; a missing local-path remote is
    /// first initialized as a fresh bare repository.
    pub fn open(
        work_dir: impl AsRef<Path>,
        remote: impl Into<String>,
    ) -> Result<Self, RepositoryError> {
        let work_dir = work_dir.as_ref().to_path_buf();
        let remote = remote.into();

        if work_dir.join(".git").exists() {
            let found = run_git(&work_dir, &["remote", "get-url", "origin"])?
                .trim()
                .to_string();
            if found != remote {
                return Err(RepositoryError::RemoteMismatch {
                    work_dir: work_dir.display().to_string(),
                    expected: remote,
                    found,
                });
            }
        } else {
            if is_local_path(&remote) && !Path::new(&remote).exists() {
                info!(remote = %remote, "initializing fresh bare remote");
                init_bare(Path::new(&remote))?;
            }
            if let Some(parent) = work_dir.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| RepositoryError::CommandFailed {
                    args: "clone".to_string(),
                    message: format!("{}: {e}", parent.display()),
                })?;
            }
            debug!(remote = %remote, work_dir = %work_dir.display(), "cloning working copy");
            let work = work_dir.display().to_string();
            run_git_sync(
                work_dir.parent().unwrap_or(Path::new(".")),
                &["clone", &remote, &work],
                &remote,
            )?;
        }

        let repo = Self { work_dir, remote };
        // Commits must not depend on the operator's global git identity.
        repo.ensure_identity()?;
        Ok(repo)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Bring the working copy up to the latest published state.
    ///
    /// Fails with [`RepositoryError::DirtyWorkingCopy`] when uncommitted
    /// changes or unpublished commits are present: both signal an earlier
    /// crash between mutation and publish, and require operator
    /// intervention rather than silent continuation.
    pub fn sync(&self) -> Result<(), RepositoryError> {
        if !self.status_clean()? {
            return Err(self.dirty());
        }

        run_git_sync(&self.work_dir, &["fetch", "origin"], &self.remote)?;

        let branch = self.current_branch()?;
        let upstream = format!("origin/{branch}");
        let upstream_exists = self.rev_exists(&upstream)?;
        let head_exists = self.rev_exists("HEAD")?;

        match (head_exists, upstream_exists) {
            (true, true) => {
                let ahead = run_git(
                    &self.work_dir,
                    &["rev-list", "--count", &format!("{upstream}..HEAD")],
                )?;
                if ahead.trim() != "0" {
                    // Committed but never published: a crash happened
                    // between commit and publish.
                    return Err(self.dirty());
                }
                debug!(work_dir = %self.work_dir.display(), "fast-forwarding to published state");
                run_git(&self.work_dir, &["merge", "--ff-only", &upstream])?;
            }
            (true, false) => return Err(self.dirty()),
            (false, true) => {
                // Fresh clone raced an empty remote that has since gained
                // history; adopt the published branch.
                run_git(&self.work_dir, &["checkout", "-B", &branch, &upstream])?;
            }
            (false, false) => {}
        }
        Ok(())
    }

    /// Stage everything and commit. Nothing staged is a no-op, not an
    /// error; returns whether a commit was created.
    pub fn commit(&self, message: &str) -> Result<bool, RepositoryError> {
        run_git(&self.work_dir, &["add", "--all"])?;
        if self.status_clean()? {
            debug!(work_dir = %self.work_dir.display(), "nothing to commit");
            return Ok(false);
        }
        run_git(&self.work_dir, &["commit", "-m", message])?;
        info!(work_dir = %self.work_dir.display(), message, "committed");
        Ok(true)
    }

    /// Push the current branch to the remote. A branch with no commits
    /// yet has nothing to publish and is a no-op.
    pub fn publish(&self) -> Result<(), RepositoryError> {
        if !self.rev_exists("HEAD")? {
            return Ok(());
        }
        let branch = self.current_branch()?;
        run_git_sync(
            &self.work_dir,
            &["push", "-u", "origin", &branch],
            &self.remote,
        )?;
        info!(remote = %self.remote, branch, "published");
        Ok(())
    }

    /// Run one read-modify-write cycle as a transaction.
    ///
    /// Synchronizes, snapshots the head, lets `mutate` edit the working
    /// copy, then commits and publishes. Any failure after the snapshot
    /// restores the working copy and local history to the last published
    /// state before the error is returned, so no partial mutation is
    /// ever visible to a collaborator or to a retry.
    pub fn transact<T, E, F>(&self, message: &str, mutate: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&Path) -> Result<T, E>,
    {
        self.sync().map_err(E::from)?;
        let published_head = self.head().map_err(E::from)?;

        let value = match mutate(&self.work_dir) {
            Ok(value) => value,
            Err(error) => {
                self.restore(published_head.as_deref());
                return Err(error);
            }
        };

        if let Err(error) = self.commit(message) {
            self.restore(published_head.as_deref());
            return Err(E::from(error));
        }
        if let Err(error) = self.publish() {
            self.restore(published_head.as_deref());
            return Err(E::from(error));
        }
        Ok(value)
    }

    /// Current head commit id, if the branch has been born.
    pub fn head(&self) -> Result<Option<String>, RepositoryError> {
        if self.rev_exists("HEAD")? {
            let oid = run_git(&self.work_dir, &["rev-parse", "HEAD"])?;
            Ok(Some(oid.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Number of commits reachable from head.
    pub fn commit_count(&self) -> Result<u64, RepositoryError> {
        if !self.rev_exists("HEAD")? {
            return Ok(0);
        }
        let count = run_git(&self.work_dir, &["rev-list", "--count", "HEAD"])?;
        count
            .trim()
            .parse()
            .map_err(|e| RepositoryError::Parse(format!("rev-list count: {e}")))
    }

    /// Restore working copy, index and branch to `published_head`.
    ///
    /// `None` means the branch had not been born when the transaction
    /// started (covers rolling back a repository's very first commit).
    fn restore(&self, published_head: Option<&str>) {
        warn!(work_dir = %self.work_dir.display(), "rolling back to last published state");
        match published_head {
            Some(oid) => {
                let _ = run_git(&self.work_dir, &["reset", "--hard", oid]);
            }
            None => {
                if let Ok(branch) = self.current_branch() {
                    let _ = run_git(
                        &self.work_dir,
                        &["update-ref", "-d", &format!("refs/heads/{branch}")],
                    );
                }
                let _ = run_git(&self.work_dir, &["read-tree", "--empty"]);
            }
        }
        let _ = run_git(&self.work_dir, &["clean", "-fd"]);
    }

    fn dirty(&self) -> RepositoryError {
        RepositoryError::DirtyWorkingCopy {
            work_dir: self.work_dir.display().to_string(),
        }
    }

    fn status_clean(&self) -> Result<bool, RepositoryError> {
        let status = run_git(&self.work_dir, &["status", "--porcelain"])?;
        Ok(status.trim().is_empty())
    }

    fn current_branch(&self) -> Result<String, RepositoryError> {
        let branch = run_git(&self.work_dir, &["symbolic-ref", "--short", "HEAD"])?;
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(RepositoryError::Parse(
                "symbolic-ref returned no branch".to_string(),
            ));
        }
        Ok(branch.to_string())
    }

    fn rev_exists(&self, rev: &str) -> Result<bool, RepositoryError> {
        let output = git_output(
            &self.work_dir,
            &["rev-parse", "--verify", "--quiet", rev],
        )?;
        Ok(output.status.success())
    }

    fn ensure_identity(&self) -> Result<(), RepositoryError> {
        let has_name = git_output(&self.work_dir, &["config", "user.name"])?
            .status
            .success();
        if !has_name {
            run_git(&self.work_dir, &["config", "user.name", "deidmap"])?;
        }
        let has_email = git_output(&self.work_dir, &["config", "user.email"])?
            .status
            .success();
        if !has_email {
            run_git(&self.work_dir, &["config", "user.email", "deidmap@localhost"])?;
        }
        Ok(())
    }
}

/// Initialize a bare repository at `path`, creating parents as needed.
pub fn init_bare(path: &Path) -> Result<(), RepositoryError> {
    std::fs::create_dir_all(path).map_err(|e| RepositoryError::CommandFailed {
        args: "init --bare".to_string(),
        message: format!("{}: {e}", path.display()),
    })?;
    run_git(path, &["init", "--bare"])?;
    Ok(())
}

fn is_local_path(remote: &str) -> bool {
    !remote.contains("://") && !remote.starts_with("git@")
}

fn git_output(cwd: &Path, args: &[&str]) -> Result<std::process::Output, RepositoryError> {
    Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RepositoryError::NotInstalled
            } else {
                RepositoryError::CommandFailed {
                    args: args.join(" "),
                    message: err.to_string(),
                }
            }
        })
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String, RepositoryError> {
    let output = git_output(cwd, args)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            "unknown error".to_string()
        } else {
            stderr
        };
        Err(RepositoryError::CommandFailed {
            args: args.join(" "),
            message,
        })
    }
}

/// Like [`run_git`], but failures are classified as retryable
/// synchronization errors (clone/fetch/push touch the shared remote).
fn run_git_sync(cwd: &Path, args: &[&str], remote: &str) -> Result<String, RepositoryError> {
    run_git(cwd, args).map_err(|err| match err {
        RepositoryError::CommandFailed { message, .. } => RepositoryError::Synchronization {
            remote: remote.to_string(),
            message,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "deidmap-vcs-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        path
    }

    fn open_fresh(root: &Path) -> GitRepository {
        let remote = root.join("store.git").display().to_string();
        GitRepository::open(root.join("work"), remote).expect("open should succeed")
    }

    #[test]
    fn open_initializes_missing_remote_and_clone() {
        let root = temp_dir("open");
        let repo = open_fresh(&root);
        assert!(root.join("store.git").exists());
        assert!(repo.work_dir().join(".git").exists());
        assert_eq!(repo.commit_count().expect("count"), 0);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn open_rejects_remote_mismatch() {
        let root = temp_dir("mismatch");
        let repo = open_fresh(&root);
        let err = GitRepository::open(repo.work_dir(), "file:///elsewhere.git")
            .expect_err("mismatched remote must be rejected");
        assert!(matches!(err, RepositoryError::RemoteMismatch { .. }));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn transact_commits_and_publishes() {
        let root = temp_dir("transact");
        let repo = open_fresh(&root);
        repo.transact::<_, RepositoryError, _>("add greeting", |work_dir| {
            fs::write(work_dir.join("greeting.txt"), "hello\n").map_err(|e| {
                RepositoryError::CommandFailed {
                    args: "write".to_string(),
                    message: e.to_string(),
                }
            })
        })
        .expect("transaction should publish");
        assert_eq!(repo.commit_count().expect("count"), 1);

        // A second clone of the same remote observes the published file.
        let other = GitRepository::open(root.join("work2"), repo.remote().to_string())
            .expect("second clone should open");
        other.sync().expect("sync should pull");
        assert_eq!(
            fs::read_to_string(other.work_dir().join("greeting.txt")).expect("file should exist"),
            "hello\n"
        );
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn transact_rolls_back_first_commit_on_mutation_failure() {
        let root = temp_dir("rollback-first");
        let repo = open_fresh(&root);
        let err = repo
            .transact::<(), RepositoryError, _>("doomed", |work_dir| {
                fs::write(work_dir.join("partial.txt"), "partial\n").ok();
                Err(RepositoryError::Parse("mutation failed".to_string()))
            })
            .expect_err("mutation failure must propagate");
        assert!(matches!(err, RepositoryError::Parse(_)));
        assert!(!repo.work_dir().join("partial.txt").exists());
        assert_eq!(repo.commit_count().expect("count"), 0);
        // Fully retryable afterwards.
        repo.sync().expect("sync after rollback should succeed");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn transact_rolls_back_to_published_head_on_publish_failure() {
        let root = temp_dir("rollback-push");
        let repo = open_fresh(&root);
        repo.transact::<_, RepositoryError, _>("base", |work_dir| {
            fs::write(work_dir.join("base.txt"), "base\n").map_err(|e| {
                RepositoryError::CommandFailed {
                    args: "write".to_string(),
                    message: e.to_string(),
                }
            })
        })
        .expect("base transaction should publish");
        let published = repo.head().expect("head").expect("head exists");

        // Make the remote unreachable so the push fails after commit.
        let remote_path = root.join("store.git");
        let hidden = root.join("store.git.hidden");
        fs::rename(&remote_path, &hidden).expect("remote should move");

        let err = repo
            .transact::<_, RepositoryError, _>("doomed", |work_dir| {
                fs::write(work_dir.join("next.txt"), "next\n").map_err(|e| {
                    RepositoryError::CommandFailed {
                        args: "write".to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .expect_err("publish failure must propagate");
        assert!(matches!(err, RepositoryError::Synchronization { .. }));

        fs::rename(&hidden, &remote_path).expect("remote should move back");
        assert_eq!(repo.head().expect("head").as_deref(), Some(published.as_str()));
        assert!(!repo.work_dir().join("next.txt").exists());
        repo.sync().expect("repository must be retryable after rollback");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn sync_flags_unpublished_commit_as_dirty() {
        let root = temp_dir("dirty");
        let repo = open_fresh(&root);
        // Simulate a crash between commit and publish.
        fs::write(repo.work_dir().join("orphan.txt"), "orphan\n").expect("write");
        repo.commit("crashed before publish").expect("commit");
        let err = repo.sync().expect_err("unpublished commit must be flagged");
        assert!(matches!(err, RepositoryError::DirtyWorkingCopy { .. }));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn sync_flags_uncommitted_changes_as_dirty() {
        let root = temp_dir("uncommitted");
        let repo = open_fresh(&root);
        fs::write(repo.work_dir().join("stray.txt"), "stray\n").expect("write");
        let err = repo.sync().expect_err("stray file must be flagged");
        assert!(matches!(err, RepositoryError::DirtyWorkingCopy { .. }));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn concurrent_collaborator_conflict_surfaces_as_synchronization() {
        let root = temp_dir("conflict");
        let a = open_fresh(&root);
        let b = GitRepository::open(root.join("work-b"), a.remote().to_string())
            .expect("second collaborator should open");

        a.transact::<_, RepositoryError, _>("a writes", |work_dir| {
            fs::write(work_dir.join("a.txt"), "a\n").map_err(|e| {
                RepositoryError::CommandFailed {
                    args: "write".to_string(),
                    message: e.to_string(),
                }
            })
        })
        .expect("first writer should publish");

        // b mutates without re-syncing: commit succeeds, push is rejected
        // as non-fast-forward, and the transaction rolls back.
        fs::write(b.work_dir().join("b.txt"), "b\n").expect("write");
        b.commit("b writes").expect("commit");
        let err = b.publish().expect_err("non-fast-forward push must fail");
        assert!(matches!(err, RepositoryError::Synchronization { .. }));
        let _ = fs::remove_dir_all(root);
    }
}
