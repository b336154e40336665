//! Containment checks for archive paths resolved beneath a root.
//!
//! [`ArchivePath`] already rules out `..` and absolute names, but a symlink
//! laid down by an earlier entry (or left in the tree for the editor) can
//! still redirect a later path out of the root. Every path is therefore
//! checked one component at a time with `lstat` before it is touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{ArchivePath, Error, Result};

/// Resolves `path` beneath `root`, refusing to pass through a symlink.
///
/// Every ancestor of the final component that already exists must be a real
/// directory. The final component itself is not inspected; see
/// [`reject_final_symlink`] for operations that would follow it.
pub(crate) fn resolve_within(root: &Path, path: &ArchivePath) -> Result<PathBuf> {
    let full = path.to_fs_path(root);
    let segments: Vec<&str> = path.components().collect();
    let Some((_, ancestors)) = segments.split_last() else {
        return Ok(full);
    };

    let mut current = root.to_path_buf();
    for (depth, segment) in ancestors.iter().enumerate() {
        current.push(segment);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::PathTraversal {
                    path: path.to_string(),
                    link: segments[..=depth].join("/"),
                });
            }
            Ok(meta) if meta.is_dir() => {}
            // A file in the way or a missing directory: nothing below it can
            // exist, and the caller's own write will report the problem.
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(full)
}

/// Fails if the node at `full` is a symlink.
///
/// Used where the operation would follow the link: opening a file for
/// writing, applying a directory mode, or patching content.
pub(crate) fn reject_final_symlink(path: &ArchivePath, full: &Path) -> Result<()> {
    match fs::symlink_metadata(full) {
        Ok(meta) if meta.file_type().is_symlink() => Err(Error::PathTraversal {
            path: path.to_string(),
            link: path.to_string(),
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
