//! Deterministic traversal of a workspace tree.
//!
//! [`TreeWalker`] yields the same [`ArchiveEntry`] shape the reader does,
//! so the writer does not care whether its entries came from an archive or
//! from disk. Siblings are visited in byte order of their names and every
//! directory is yielded before its contents, which makes the order a pure
//! function of the tree: two walks over the same tree agree entry for entry.
//!
//! Symlinks are never followed. Their target is read and carried as the
//! entry's payload.

use std::fs::{self, File, Metadata};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use crate::entry::{ArchiveEntry, EntryKind};
use crate::timestamp::local_from_unix;
use crate::{ArchivePath, Error, Result};

/// Walks a directory tree, yielding one entry per node.
///
/// Entry names are relative to the walker's base directory. A walker made
/// with [`TreeWalker::new`] yields everything below the base, but not the
/// base itself; one made with [`TreeWalker::subtree`] yields the subtree's
/// own directory entry first and names every entry with the subtree as
/// prefix.
///
/// Regular files are opened as they are yielded. Drop each entry before
/// asking for the next to keep a single file open at a time.
///
/// # Example
///
/// ```rust,no_run
/// use ziprepack::walk::TreeWalker;
///
/// for entry in TreeWalker::new("/tmp/ziprepack") {
///     let entry = entry?;
///     println!("{} {}", entry.kind(), entry.path);
/// }
/// # Ok::<(), ziprepack::Error>(())
/// ```
pub struct TreeWalker {
    base: PathBuf,
    inner: walkdir::IntoIter,
}

impl TreeWalker {
    /// Walks everything below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let base = root.into();
        let inner = walker(&base).min_depth(1).into_iter();
        Self { base, inner }
    }

    /// Walks `root/subtree`, including the subtree directory itself.
    pub fn subtree(root: impl Into<PathBuf>, subtree: &ArchivePath) -> Self {
        let base = root.into();
        let inner = walker(&subtree.to_fs_path(&base)).into_iter();
        Self { base, inner }
    }

    /// Returns the directory entry names are relative to.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn convert(&self, dent: &walkdir::DirEntry) -> Result<Option<ArchiveEntry<'static>>> {
        let fs_path = dent.path();
        let relative = fs_path.strip_prefix(&self.base).map_err(|_| {
            Error::InvalidArchivePath(format!(
                "{} is outside {}",
                fs_path.display(),
                self.base.display()
            ))
        })?;
        let path = ArchivePath::from_relative_path(relative)?;

        // walkdir does not follow links, so this is lstat for symlinks.
        let meta = dent.metadata().map_err(|e| Error::Io(e.into()))?;
        let Some(kind) = kind_of(&meta) else {
            log::debug!("skipping special file {}", fs_path.display());
            return Ok(None);
        };
        let mode = node_mode(&meta, kind);
        let modified = modified_time(&meta);

        let entry = match kind {
            EntryKind::Directory => ArchiveEntry::directory(path, mode),
            EntryKind::Symlink => {
                let target = fs::read_link(fs_path)?;
                ArchiveEntry::symlink(path, mode, link_target_bytes(&target))
            }
            EntryKind::RegularFile => {
                let file = File::open(fs_path)?;
                ArchiveEntry::file(path, mode, BufReader::new(file))
            }
        };
        Ok(Some(entry.with_modified(modified)))
    }
}

impl Iterator for TreeWalker {
    type Item = Result<ArchiveEntry<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dent = match self.inner.next()? {
                Ok(dent) => dent,
                Err(e) => return Some(Err(Error::Io(e.into()))),
            };
            match self.convert(&dent) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn walker(start: &Path) -> WalkDir {
    WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
}

fn kind_of(meta: &Metadata) -> Option<EntryKind> {
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        Some(EntryKind::Symlink)
    } else if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::RegularFile)
    } else {
        None
    }
}

#[cfg(unix)]
fn node_mode(meta: &Metadata, _kind: EntryKind) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn node_mode(meta: &Metadata, kind: EntryKind) -> u32 {
    use crate::entry::{DEFAULT_SYMLINK_MODE, S_IFDIR, S_IFREG};

    let write_bits = if meta.permissions().readonly() { 0 } else { 0o200 };
    match kind {
        EntryKind::Directory => S_IFDIR | 0o555 | write_bits,
        EntryKind::RegularFile => S_IFREG | 0o444 | write_bits,
        EntryKind::Symlink => DEFAULT_SYMLINK_MODE,
    }
}

fn modified_time(meta: &Metadata) -> Option<chrono::NaiveDateTime> {
    let mtime = FileTime::from_last_modification_time(meta);
    local_from_unix(mtime.unix_seconds(), mtime.nanoseconds())
}

#[cfg(unix)]
fn link_target_bytes(target: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    target.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn link_target_bytes(target: &Path) -> Vec<u8> {
    target.to_string_lossy().replace('\\', "/").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryData;
    use std::io::Read;
    use tempfile::TempDir;

    fn names(walker: TreeWalker) -> Vec<String> {
        walker
            .map(|e| e.unwrap().path.as_str().to_string())
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("site/b")).unwrap();
        fs::create_dir_all(dir.path().join("site/a")).unwrap();
        fs::write(dir.path().join("site/b/z.txt"), "z").unwrap();
        fs::write(dir.path().join("site/a/y.txt"), "y").unwrap();
        fs::write(dir.path().join("site/index.php"), "A").unwrap();
        dir
    }

    #[test]
    fn test_walk_is_lexical_and_depth_first() {
        let dir = sample_tree();
        assert_eq!(
            names(TreeWalker::new(dir.path())),
            vec![
                "site",
                "site/a",
                "site/a/y.txt",
                "site/b",
                "site/b/z.txt",
                "site/index.php",
            ]
        );
    }

    #[test]
    fn test_walk_twice_same_order() {
        let dir = sample_tree();
        assert_eq!(
            names(TreeWalker::new(dir.path())),
            names(TreeWalker::new(dir.path()))
        );
    }

    #[test]
    fn test_subtree_includes_its_own_directory() {
        let dir = sample_tree();
        let subtree = ArchivePath::new("site").unwrap();
        let walked = names(TreeWalker::subtree(dir.path(), &subtree));
        assert_eq!(walked.first().map(String::as_str), Some("site"));
        assert_eq!(walked.len(), 6);
    }

    #[test]
    fn test_file_content_streams() {
        let dir = sample_tree();
        let entry = TreeWalker::new(dir.path().join("site"))
            .map(|e| e.unwrap())
            .find(|e| e.path.as_str() == "index.php")
            .unwrap();
        assert_eq!(entry.kind(), EntryKind::RegularFile);
        assert!(entry.modified.is_some());
        let EntryData::File(mut reader) = entry.data else {
            panic!("expected file");
        };
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "A");
    }

    #[test]
    fn test_empty_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(names(TreeWalker::new(dir.path())).is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let mut walker = TreeWalker::new(dir.path().join("absent"));
        assert!(matches!(walker.next(), Some(Err(Error::Io(_)))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_read_not_followed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        symlink("../shared/lib", dir.path().join("lib")).unwrap();
        let entries: Vec<_> = TreeWalker::new(dir.path()).map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), EntryKind::Symlink);
        assert_eq!(entries[0].link_target(), Some(b"../shared/lib".as_slice()));
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_carry_type_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        let entry = TreeWalker::new(dir.path()).next().unwrap().unwrap();
        assert_eq!(entry.mode, crate::entry::S_IFREG | 0o750);
    }
}
