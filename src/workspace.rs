//! Scratch workspace lifecycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::Result;

/// When the workspace is removed after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Remove after a successful run; keep it for inspection after a failure.
    #[default]
    OnSuccess,
    /// Remove after every run.
    Always,
    /// Never remove. The next run still recreates it from scratch.
    Never,
}

impl CleanupPolicy {
    /// Returns whether the workspace should go, given how the run ended.
    pub fn should_remove(&self, succeeded: bool) -> bool {
        match self {
            Self::OnSuccess => succeeded,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// A scratch directory owned by one run at a time.
///
/// [`Workspace::recreate`] deletes whatever the directory held and starts
/// empty. There is no locking: two runs pointed at the same root will
/// trample each other.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Names a workspace without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Empties the workspace, creating it if needed.
    pub fn recreate(&self) -> Result<()> {
        self.remove()?;
        fs::create_dir_all(&self.root)?;
        log::debug!("workspace ready at {}", self.root.display());
        Ok(())
    }

    /// Removes the workspace and everything in it. Absence is not an error.
    ///
    /// Read-only directories restored from an archive are made writable
    /// again before a second attempt.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::debug!("unlocking read-only directories in {}", self.root.display());
                unlock_directories(&self.root)?;
                fs::remove_dir_all(&self.root)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the workspace if `policy` says so, logging instead of failing.
    pub(crate) fn finish(&self, policy: CleanupPolicy, succeeded: bool) {
        if !policy.should_remove(succeeded) {
            log::debug!("keeping workspace {}", self.root.display());
            return;
        }
        if let Err(e) = self.remove() {
            log::warn!(
                "failed to remove workspace {}: {}",
                self.root.display(),
                e
            );
        }
    }
}

/// Grants the owner full access to every directory under `root`.
///
/// Walks top-down so each directory is opened only after it was unlocked.
/// Symlinks are not followed.
#[cfg(unix)]
fn unlock_directories(root: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use walkdir::WalkDir;

    for entry in WalkDir::new(root).follow_links(false).follow_root_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let mode = entry.metadata().map_err(io::Error::from)?.permissions().mode();
        if mode & 0o700 != 0o700 {
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode | 0o700))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn unlock_directories(_root: &Path) -> Result<()> {
    Ok(())
}
