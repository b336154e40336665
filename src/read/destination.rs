//! Extraction destination abstractions.
//!
//! This module provides the [`ExtractDestination`] trait for pluggable
//! extraction targets, along with the two built-in implementations:
//!
//! - [`FilesystemDestination`] - reproduces entries under a workspace root
//! - [`MemoryDestination`] - collects entries in memory (inspection, tests)

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::entry::{ArchiveEntry, EntryData, EntryKind};
use crate::path_safety::{reject_final_symlink, resolve_within};
use crate::{Error, Result};

use super::reader::EntryStreamError;

/// Mode used for ancestor directories created implicitly.
const ANCESTOR_DIR_MODE: u32 = 0o755;

/// Trait for extraction destinations.
///
/// Entries arrive one at a time, in the order the reader yields them. A
/// destination must accept a deep entry before the directory entry of its
/// parent, and a directory entry for a directory that already exists.
pub trait ExtractDestination {
    /// Reproduces one entry.
    fn write_entry(&mut self, entry: ArchiveEntry<'_>) -> Result<()>;

    /// Called once after the last entry, or after the first failure.
    ///
    /// The default implementation does nothing.
    fn on_finish(&mut self, success: bool) -> Result<()> {
        let _ = success;
        Ok(())
    }
}

/// Filesystem extraction destination.
///
/// Reproduces each entry under a root directory:
///
/// - directories are created with all missing ancestors; their permission
///   bits are applied in [`on_finish`](ExtractDestination::on_finish),
///   deepest first, so a read-only directory can still receive its children
/// - symlinks are created pointing at the decoded target
/// - regular files are created or truncated, filled from the entry stream,
///   and given the entry's permission bits
///
/// No entry is written through a symlink already in the tree: a path below
/// one, or a file or directory entry landing on one, fails with
/// [`Error::PathTraversal`].
///
/// # Example
///
/// ```rust,no_run
/// use ziprepack::read::{ArchiveReader, FilesystemDestination};
///
/// let mut reader = ArchiveReader::open_path("site.zip")?;
/// let mut dest = FilesystemDestination::new("/tmp/ziprepack");
/// let result = reader.extract_to(&mut dest)?;
/// println!("{} entries", result.total_entries());
/// # Ok::<(), ziprepack::Error>(())
/// ```
pub struct FilesystemDestination {
    /// Output directory root
    root: PathBuf,
    /// Whether to apply entry permission bits
    preserve_permissions: bool,
    /// Whether to restore archived file modification times
    preserve_mtime: bool,
    /// Directory modes waiting for the end of extraction
    pending_dirs: Vec<(PathBuf, u32)>,
}

impl FilesystemDestination {
    /// Creates a new filesystem destination rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            preserve_permissions: true,
            preserve_mtime: true,
            pending_dirs: Vec::new(),
        }
    }

    /// Sets whether to apply entry permission bits (Unix only).
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Sets whether to restore archived modification times on regular files.
    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Returns the destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_directory(&mut self, path: &Path, mode: u32) -> Result<()> {
        create_dir_all(path, ANCESTOR_DIR_MODE)?;
        if self.preserve_permissions {
            self.pending_dirs.push((path.to_path_buf(), mode));
        }
        Ok(())
    }

    /// Applies recorded directory modes, deepest directories first.
    fn apply_directory_modes(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.pending_dirs);
        // Stable: for a directory listed twice, the later entry wins.
        pending.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in pending {
            self.apply_permissions(&path, mode)?;
        }
        Ok(())
    }

    fn write_symlink(&self, path: &Path, target: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent, ANCESTOR_DIR_MODE)?;
        }
        create_symlink(path, target)
    }

    fn write_file(&self, path: &Path, mode: u32, content: &mut dyn Read) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent, ANCESTOR_DIR_MODE)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode & 0o777);
        }

        let mut file = options
            .open(path)
            .map_err(|e| Error::write_failure(path, e))?;
        // io::copy retries partial writes and reports a zero-length write as WriteZero.
        io::copy(content, &mut file).map_err(|e| classify_copy_error(path, e))?;
        drop(file);

        self.apply_permissions(path, mode)
    }

    #[cfg(unix)]
    fn apply_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if !self.preserve_permissions {
            return Ok(());
        }
        // Explicit chmod so the process umask does not alter the archived bits.
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| Error::write_failure(path, e))
    }

    #[cfg(not(unix))]
    fn apply_permissions(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    fn apply_mtime(&self, path: &Path, modified: Option<chrono::NaiveDateTime>) {
        if !self.preserve_mtime {
            return;
        }
        let Some(secs) = modified.and_then(crate::timestamp::unix_from_local) else {
            return;
        };
        let mtime = filetime::FileTime::from_unix_time(secs, 0);
        if let Err(e) = filetime::set_file_mtime(path, mtime) {
            log::warn!(
                "Failed to set modification time on '{}': {}",
                path.display(),
                e
            );
        }
    }
}

impl ExtractDestination for FilesystemDestination {
    fn write_entry(&mut self, entry: ArchiveEntry<'_>) -> Result<()> {
        let path = resolve_within(&self.root, &entry.path)?;
        let mode = entry.mode;
        let modified = entry.modified;

        log::debug!("materialize {} {}", entry.kind(), path.display());

        match entry.data {
            EntryData::Directory => {
                reject_final_symlink(&entry.path, &path)?;
                self.write_directory(&path, mode)
            }
            EntryData::Symlink(target) => self.write_symlink(&path, &target),
            EntryData::File(mut content) => {
                reject_final_symlink(&entry.path, &path)?;
                self.write_file(&path, mode, &mut content)?;
                self.apply_mtime(&path, modified);
                Ok(())
            }
        }
    }

    fn on_finish(&mut self, success: bool) -> Result<()> {
        if !success {
            // Leave a failed tree writable so the next run can clear it.
            self.pending_dirs.clear();
            return Ok(());
        }
        self.apply_directory_modes()
    }
}

/// Distinguishes a failing entry stream from a failing destination file.
///
/// `io::copy` reports both sides through one error, so the reader tags its
/// stream errors with [`EntryStreamError`].
fn classify_copy_error(path: &Path, err: io::Error) -> Error {
    let from_entry = err
        .get_ref()
        .is_some_and(|inner| inner.is::<EntryStreamError>());
    if from_entry {
        Error::entry_read(path.display().to_string(), err)
    } else {
        Error::write_failure(path, err)
    }
}

/// Creates a directory and its missing ancestors. Existing directories are fine.
fn create_dir_all(path: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(path)
        .map_err(|e| Error::write_failure(path, e))
}

/// Creates a symbolic link at `link_path` pointing to the raw `target`.
#[cfg(unix)]
pub(crate) fn create_symlink(link_path: &Path, target: &[u8]) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::os::unix::fs::symlink(OsStr::from_bytes(target), link_path).map_err(|source| {
        Error::SymlinkCreateFailure {
            path: link_path.to_path_buf(),
            target: String::from_utf8_lossy(target).into_owned(),
            source,
        }
    })
}

/// Creates a symbolic link at `link_path` pointing to the raw `target`.
#[cfg(windows)]
pub(crate) fn create_symlink(link_path: &Path, target: &[u8]) -> Result<()> {
    let target_str = String::from_utf8_lossy(target).into_owned();
    let to_error = |source| Error::SymlinkCreateFailure {
        path: link_path.to_path_buf(),
        target: target_str.clone(),
        source,
    };

    // Windows needs to know whether the target is a directory.
    let resolved = link_path.parent().map(|p| p.join(&target_str));
    if resolved.as_deref().is_some_and(Path::is_dir) {
        std::os::windows::fs::symlink_dir(&target_str, link_path).map_err(to_error)
    } else {
        std::os::windows::fs::symlink_file(&target_str, link_path).map_err(to_error)
    }
}

/// Creates a symbolic link at `link_path` pointing to the raw `target`.
#[cfg(not(any(unix, windows)))]
pub(crate) fn create_symlink(link_path: &Path, target: &[u8]) -> Result<()> {
    Err(Error::SymlinkCreateFailure {
        path: link_path.to_path_buf(),
        target: String::from_utf8_lossy(target).into_owned(),
        source: io::Error::new(io::ErrorKind::Unsupported, "symbolic links not supported"),
    })
}

/// A materialized entry held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    /// The entry kind.
    pub kind: EntryKind,
    /// Full Unix mode.
    pub mode: u32,
    /// File content or symlink target; empty for directories.
    pub content: Vec<u8>,
}

/// In-memory extraction destination.
///
/// Collects every entry keyed by its archive path. Useful for comparing
/// archives entry by entry without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    entries: BTreeMap<String, MemoryEntry>,
}

impl MemoryDestination {
    /// Creates a new memory destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected entries, ordered by path.
    pub fn entries(&self) -> &BTreeMap<String, MemoryEntry> {
        &self.entries
    }

    /// Gets a collected entry by path.
    pub fn get(&self, path: &str) -> Option<&MemoryEntry> {
        self.entries.get(path)
    }

    /// Takes ownership of the collected entries.
    pub fn into_entries(self) -> BTreeMap<String, MemoryEntry> {
        self.entries
    }

    /// Returns the number of collected entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExtractDestination for MemoryDestination {
    fn write_entry(&mut self, entry: ArchiveEntry<'_>) -> Result<()> {
        let kind = entry.kind();
        let path = entry.path.as_str().to_string();
        let content = match entry.data {
            EntryData::Directory => Vec::new(),
            EntryData::Symlink(target) => target,
            EntryData::File(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .map_err(|e| Error::entry_read(&path, e))?;
                buf
            }
        };
        self.entries.insert(
            path,
            MemoryEntry {
                kind,
                mode: entry.mode,
                content,
            },
        );
        Ok(())
    }
}
