//! Applies edit plans to a materialized tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::path_safety::{reject_final_symlink, resolve_within};
use crate::{ArchivePath, Error, Result};

use super::operation::{DeleteOp, EditPlan, Operation, PatchOp, RenameOp};

/// What to do when a patch's search string is not in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPatternPolicy {
    /// Leave the file byte-identical and carry on.
    #[default]
    Ignore,
    /// Stop with [`Error::PatternNotFound`].
    Fail,
}

/// Result of applying an edit plan.
#[must_use = "edit result should be checked to verify operation completed as expected"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Number of renames performed.
    pub renamed: usize,
    /// Number of files whose content was patched.
    pub patched: usize,
    /// Number of patches whose search string was absent.
    pub patterns_missing: usize,
    /// Number of files deleted.
    pub deleted: usize,
}

impl EditResult {
    /// Returns the number of operations that ran.
    pub fn total_operations(&self) -> usize {
        self.renamed + self.patched + self.patterns_missing + self.deleted
    }

    /// Returns the number of operations that changed the tree.
    pub fn changes(&self) -> usize {
        self.renamed + self.patched + self.deleted
    }
}

/// Applies [`EditPlan`]s to a directory tree in place.
///
/// Operation paths are resolved against the editor's root and may not pass
/// through a symlink in the tree ([`Error::PathTraversal`]). A symlink can
/// itself be renamed or deleted, but not patched. Operations run in plan
/// order and the first failure stops the run, leaving earlier edits in
/// place: there is no rollback.
///
/// # Example
///
/// ```rust,no_run
/// use ziprepack::edit::{EditPlan, TreeEditor};
///
/// let plan = EditPlan::builder()
///     .rename("html/index.php", "index.php")?
///     .patch("index.php", "A", "B")?
///     .build();
///
/// let result = TreeEditor::new("/tmp/ziprepack").apply(&plan)?;
/// println!("{} renamed, {} patched", result.renamed, result.patched);
/// # Ok::<(), ziprepack::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TreeEditor {
    root: PathBuf,
    missing_pattern: MissingPatternPolicy,
}

impl TreeEditor {
    /// Creates an editor for the tree at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            missing_pattern: MissingPatternPolicy::default(),
        }
    }

    /// Sets the policy for patches whose search string is absent.
    pub fn missing_pattern(mut self, policy: MissingPatternPolicy) -> Self {
        self.missing_pattern = policy;
        self
    }

    /// Returns the tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Applies every operation of `plan`, in order.
    ///
    /// The plan is validated before anything on disk is touched.
    pub fn apply(&self, plan: &EditPlan) -> Result<EditResult> {
        plan.validate()?;

        let mut result = EditResult::default();
        for op in plan {
            log::debug!("{} {}", op.operation_type(), op.source_path());
            match op {
                Operation::Rename(op) => {
                    self.rename(op)?;
                    result.renamed += 1;
                }
                Operation::Patch(op) => {
                    if self.patch(op)? {
                        result.patched += 1;
                    } else {
                        result.patterns_missing += 1;
                    }
                }
                Operation::Delete(op) => {
                    self.delete(op)?;
                    result.deleted += 1;
                }
            }
        }
        Ok(result)
    }

    fn resolve(&self, path: &ArchivePath) -> Result<PathBuf> {
        resolve_within(&self.root, path)
    }

    fn rename(&self, op: &RenameOp) -> Result<()> {
        let from = self.resolve(&op.from)?;
        let to = self.resolve(&op.to)?;

        if !exists(&from)? {
            return Err(Error::MissingSource {
                path: op.from.to_string(),
            });
        }
        if exists(&to)? {
            return Err(Error::DestinationConflict {
                path: op.to.to_string(),
            });
        }

        // rename(2) keeps the inode, so mode and content move untouched.
        fs::rename(&from, &to).map_err(|e| Error::write_failure(&to, e))
    }

    /// Returns whether the file changed.
    fn patch(&self, op: &PatchOp) -> Result<bool> {
        let path = self.resolve(&op.path)?;
        // fs::read and fs::write would both follow a link in place.
        reject_final_symlink(&op.path, &path)?;
        let content = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::MissingTarget {
                path: op.path.to_string(),
            },
            _ => Error::Io(e),
        })?;

        let Some(patched) = replace_first(&content, op.search.as_bytes(), op.replace.as_bytes())
        else {
            return match self.missing_pattern {
                MissingPatternPolicy::Ignore => {
                    log::debug!("pattern {:?} not found in {}", op.search, op.path);
                    Ok(false)
                }
                MissingPatternPolicy::Fail => Err(Error::PatternNotFound {
                    path: op.path.to_string(),
                    pattern: op.search.clone(),
                }),
            };
        };

        // fs::write truncates before writing, so a shorter result leaves no
        // stale tail behind.
        fs::write(&path, patched).map_err(|e| Error::write_failure(&path, e))?;
        Ok(true)
    }

    fn delete(&self, op: &DeleteOp) -> Result<()> {
        let path = self.resolve(&op.path)?;
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MissingTarget {
                    path: op.path.to_string(),
                });
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let removed = if meta.is_dir() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| Error::write_failure(&path, e))
    }
}

/// Checks for a node without following a final symlink.
fn exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Replaces the first occurrence of `needle`, or returns `None` if absent.
fn replace_first(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() {
        return None;
    }
    let start = haystack
        .windows(needle.len())
        .position(|window| window == needle)?;
    let end = start + needle.len();

    let mut out = Vec::with_capacity(haystack.len() - needle.len() + replacement.len());
    out.extend_from_slice(&haystack[..start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&haystack[end..]);
    Some(out)
}
