use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Working directory for one run's intermediate files.
///
/// Lives at `<root>/run-<run_id>` and is removed when the guard is dropped,
/// whichever way the run ends.
#[derive(Debug)]
pub struct RunWorkspace {
    path: PathBuf,
}

impl RunWorkspace {
    pub async fn create(root: &Path, run_id: &str) -> io::Result<Self> {
        let path = root.join(format!("run-{run_id}"));
        tokio::fs::create_dir_all(&path).await?;
        info!(path = %path.display(), "Created working directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed working directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove working directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removed_on_drop_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workspace = RunWorkspace::create(root.path(), "abc").await.unwrap();
            std::fs::write(workspace.path().join("segment.mp4"), b"data").unwrap();
            assert!(workspace.path().is_dir());
            workspace.path().to_path_buf()
        };
        assert_eq!(path, root.path().join("run-abc"));
        assert!(!path.exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn separate_runs_get_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let first = RunWorkspace::create(root.path(), "one").await.unwrap();
        let second = RunWorkspace::create(root.path(), "two").await.unwrap();
        assert_ne!(first.path(), second.path());
        drop(first);
        assert!(second.path().is_dir());
    }

    #[tokio::test]
    async fn drop_tolerates_already_removed_directory() {
        let root = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::create(root.path(), "gone").await.unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();
        drop(workspace);
    }
}
