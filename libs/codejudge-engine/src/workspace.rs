/// Workspace Manager - per-submission scratch directories
///
/// Every submission gets `<root>/<submission id>/`, so concurrent
/// submissions never share source files or artifacts. The directory is
/// removed on every terminal path; if a caller loses the handle without
/// calling [`Workspace::cleanup`], the drop guard removes it instead.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (or reuse) the directory for one submission
    pub async fn prepare(&self, submission_id: Uuid) -> Result<Workspace> {
        let dir = self.root.join(submission_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        // Test processes run with the workspace as cwd; keep paths absolute
        let dir = tokio::fs::canonicalize(&dir).await?;
        debug!(submission_id = %submission_id, dir = %dir.display(), "Workspace ready");

        Ok(Workspace {
            submission_id,
            dir,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct Workspace {
    submission_id: Uuid,
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub async fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf> {
        let path = self.path(file_name);
        tokio::fs::write(&path, code).await?;
        Ok(path)
    }

    /// Delete the named files, then the directory itself.
    ///
    /// Failures are logged and swallowed: cleanup must never replace the
    /// result the caller is about to return. Files that were never created
    /// (e.g. the artifact after a failed compile) are not failures.
    pub async fn cleanup(mut self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    submission_id = %self.submission_id,
                    path = %path.display(),
                    error = %e,
                    "Failed to delete workspace file"
                ),
            }
        }

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                submission_id = %self.submission_id,
                dir = %self.dir.display(),
                error = %e,
                "Failed to delete workspace directory"
            ),
        }

        self.released = true;
        debug!(submission_id = %self.submission_id, "Workspace cleaned up");
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let submission_id = self.submission_id;
        let dir = std::mem::take(&mut self.dir);
        // Keep blocking filesystem work off the async worker threads
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(submission_id, &dir));
            }
            Err(_) => remove_abandoned(submission_id, &dir),
        }
    }
}

fn remove_abandoned(submission_id: Uuid, dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != ErrorKind::NotFound {
            warn!(
                submission_id = %submission_id,
                dir = %dir.display(),
                error = %e,
                "Failed to remove abandoned workspace"
            );
        }
    }
}
