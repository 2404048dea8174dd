//! Per-run repository directories
//!
//! The directory is created fresh when a client starts and removed when
//! its cancellation token fires. Removal has no other trigger.

use std::io;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Name prefix for repository directories under the system temp dir
pub const DEFAULT_PREFIX: &str = "p2p-fetch-";

/// Create a new, uniquely named directory under the system temp dir
pub fn create(prefix: &str) -> io::Result<PathBuf> {
    create_in(&std::env::temp_dir(), prefix)
}

/// Create a new, uniquely named directory under `base`.
///
/// The directory outlives this call; [`spawn_cleanup`] removes it.
pub fn create_in(base: &Path, prefix: &str) -> io::Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(base)?;
    Ok(dir.keep())
}

/// Remove `path` recursively once `cancel` fires.
///
/// Failures are logged and otherwise ignored.
pub fn spawn_cleanup(path: PathBuf, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => debug!("Removed repository {}", path.display()),
            Err(e) => warn!("Failed to remove repository {}: {}", path.display(), e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_create_is_unique() {
        let base = tempdir().unwrap();
        let a = create_in(base.path(), "repo-").unwrap();
        let b = create_in(base.path(), "repo-").unwrap();

        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("repo-"));
    }

    #[test]
    fn test_create_survives_and_fails_without_base() {
        let base = tempdir().unwrap();
        let repo = create_in(base.path(), DEFAULT_PREFIX).unwrap();
        assert_eq!(repo.parent(), Some(base.path()));
        // Not removed when the builder's handle goes away
        assert!(repo.is_dir());

        let missing = base.path().join("absent");
        assert!(create_in(&missing, DEFAULT_PREFIX).is_err());
    }

    #[tokio::test]
    async fn test_cleanup_waits_for_cancellation() {
        let base = tempdir().unwrap();
        let repo = create_in(base.path(), "repo-").unwrap();
        std::fs::create_dir_all(repo.join("blocks/nested")).unwrap();
        std::fs::write(repo.join("config"), "{}").unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_cleanup(repo.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(repo.exists());
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
        assert!(!repo.exists());
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_swallowed() {
        let base = tempdir().unwrap();
        let missing = base.path().join("never-created");

        let cancel = CancellationToken::new();
        cancel.cancel();
        spawn_cleanup(missing, cancel).await.unwrap();
    }
}
