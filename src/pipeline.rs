//! The extract → edit → repack pipeline.
//!
//! A [`Repackager`] runs one archive through every phase in order:
//!
//! 1. Recreate the scratch workspace empty
//! 2. Extract the source archive into it
//! 3. Apply the edit plan
//! 4. Walk the edited tree and write the destination archive
//!
//! The first failure ends the run and is returned as is. The source archive
//! is only ever read, so rerunning from scratch is always safe.
//!
//! # Example
//!
//! ```rust,no_run
//! use ziprepack::edit::EditPlan;
//! use ziprepack::{RepackOptions, Repackager, Subtree};
//!
//! let plan = EditPlan::builder()
//!     .rename("html/index.php", "index.php")?
//!     .patch("index.php", "A", "B")?
//!     .build();
//!
//! let options = RepackOptions::new("/tmp/ziprepack")
//!     .plan(plan)
//!     .subtree(Subtree::ArchiveStem);
//!
//! let result = Repackager::new(options).run("site.zip", "out/site.zip")?;
//! println!("{}: {} entries", result.destination.display(), result.write.total_entries());
//! # Ok::<(), ziprepack::Error>(())
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::edit::{EditPlan, EditResult, MissingPatternPolicy, TreeEditor};
use crate::path_safety::{reject_final_symlink, resolve_within};
use crate::read::{ArchiveReader, ExtractResult, FilesystemDestination};
use crate::walk::TreeWalker;
use crate::workspace::{CleanupPolicy, Workspace};
use crate::write::{ArchiveWriter, WriteOptions, WriteResult};
use crate::{ArchivePath, Error, Result};

/// Which part of the workspace is edited and repacked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Subtree {
    /// The whole workspace. Entry names match the source archive's.
    #[default]
    Root,
    /// The directory named after the source archive, minus its `.zip`
    /// suffix. Entry names keep that directory as their first segment and
    /// the directory itself is written as an entry.
    ArchiveStem,
    /// A directory chosen by the caller, treated like `ArchiveStem`.
    Named(ArchivePath),
}

impl Subtree {
    /// Resolves the subtree for a given source archive.
    ///
    /// Returns `None` for [`Subtree::Root`].
    pub fn resolve(&self, source: &Path) -> Result<Option<ArchivePath>> {
        match self {
            Self::Root => Ok(None),
            Self::Named(path) => Ok(Some(path.clone())),
            Self::ArchiveStem => {
                let name = file_name(source)?;
                let stem = name.strip_suffix(".zip").unwrap_or(name);
                ArchivePath::new(stem).map(Some)
            }
        }
    }
}

/// Options for a repack run.
///
/// # Example
///
/// ```rust
/// use ziprepack::edit::MissingPatternPolicy;
/// use ziprepack::workspace::CleanupPolicy;
/// use ziprepack::RepackOptions;
///
/// let options = RepackOptions::new("/tmp/ziprepack")
///     .missing_pattern(MissingPatternPolicy::Fail)
///     .cleanup(CleanupPolicy::Never);
/// assert_eq!(options.workspace_root().to_str(), Some("/tmp/ziprepack"));
/// ```
#[derive(Debug, Clone)]
pub struct RepackOptions {
    workspace_root: PathBuf,
    plan: EditPlan,
    subtree: Subtree,
    missing_pattern: MissingPatternPolicy,
    cleanup: CleanupPolicy,
    write: WriteOptions,
}

impl RepackOptions {
    /// Creates options with an empty plan, using `workspace_root` as scratch.
    ///
    /// Everything under `workspace_root` is deleted at the start of each run.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            plan: EditPlan::default(),
            subtree: Subtree::default(),
            missing_pattern: MissingPatternPolicy::default(),
            cleanup: CleanupPolicy::default(),
            write: WriteOptions::default(),
        }
    }

    /// Sets the edit plan.
    pub fn plan(mut self, plan: EditPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Sets the subtree to edit and repack.
    pub fn subtree(mut self, subtree: Subtree) -> Self {
        self.subtree = subtree;
        self
    }

    /// Sets the policy for patches whose search string is absent.
    pub fn missing_pattern(mut self, policy: MissingPatternPolicy) -> Self {
        self.missing_pattern = policy;
        self
    }

    /// Sets when the workspace is removed.
    pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = policy;
        self
    }

    /// Sets the options for writing the destination archive.
    pub fn write_options(mut self, options: WriteOptions) -> Self {
        self.write = options;
        self
    }

    /// Returns the workspace root.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Returns the edit plan.
    pub fn edit_plan(&self) -> &EditPlan {
        &self.plan
    }
}

/// Summary of a repack run.
#[must_use = "repack result should be checked to verify the run did what was expected"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackResult {
    /// Entries extracted from the source.
    pub extract: ExtractResult,
    /// Edits applied to the workspace.
    pub edit: EditResult,
    /// Entries written to the destination.
    pub write: WriteResult,
    /// The archive that was written.
    pub destination: PathBuf,
}

/// Runs archives through the extract → edit → repack pipeline.
#[derive(Debug, Clone)]
pub struct Repackager {
    options: RepackOptions,
    workspace: Workspace,
}

impl Repackager {
    /// Creates a repackager.
    pub fn new(options: RepackOptions) -> Self {
        let workspace = Workspace::new(options.workspace_root.clone());
        Self { options, workspace }
    }

    /// Returns the options.
    pub fn options(&self) -> &RepackOptions {
        &self.options
    }

    /// Repacks `source` into `destination`.
    ///
    /// On a write failure the partial destination is deleted. The
    /// workspace is removed afterwards according to the cleanup policy.
    pub fn run(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<RepackResult> {
        let outcome = self.run_phases(source.as_ref(), destination.as_ref());
        self.workspace.finish(self.options.cleanup, outcome.is_ok());
        outcome
    }

    /// Repacks `source` into `out_dir`, under the source's own file name.
    pub fn run_to_dir(
        &self,
        source: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
    ) -> Result<RepackResult> {
        let destination = default_destination(out_dir.as_ref(), source.as_ref())?;
        self.run(source, destination)
    }

    fn run_phases(&self, source: &Path, destination: &Path) -> Result<RepackResult> {
        let root = self.workspace.root();
        self.workspace.recreate()?;

        let mut reader = ArchiveReader::open_path(source)?;
        let mut materializer = FilesystemDestination::new(root);
        let extract = reader.extract_to(&mut materializer)?;
        log::info!(
            "extracted {} entries from {} ({} skipped)",
            extract.total_entries(),
            source.display(),
            extract.skipped
        );

        let subtree = self.options.subtree.resolve(source)?;
        let edit_root = match &subtree {
            Some(subtree) => {
                let dir = resolve_within(root, subtree)?;
                reject_final_symlink(subtree, &dir)?;
                if !dir.is_dir() {
                    return Err(Error::MissingTarget {
                        path: subtree.to_string(),
                    });
                }
                dir
            }
            None => root.to_path_buf(),
        };

        let edit = TreeEditor::new(edit_root)
            .missing_pattern(self.options.missing_pattern)
            .apply(&self.options.plan)?;
        log::info!("applied {} edits", edit.total_operations());

        let walker = match &subtree {
            Some(subtree) => TreeWalker::subtree(root, subtree),
            None => TreeWalker::new(root),
        };
        let write = write_archive(walker, destination, &self.options.write)?;
        log::info!("created {}", destination.display());

        Ok(RepackResult {
            extract,
            edit,
            write,
            destination: destination.to_path_buf(),
        })
    }
}

fn write_archive(
    walker: TreeWalker,
    destination: &Path,
    options: &WriteOptions,
) -> Result<WriteResult> {
    let written = ArchiveWriter::create_path(destination, options.clone()).and_then(|mut writer| {
        writer.write_entries(walker)?;
        writer.finish()
    });

    if written.is_err() {
        discard_partial(destination);
    }
    written
}

/// Deletes a half-written archive so it cannot be mistaken for output.
fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("removed partial archive {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "failed to remove partial archive {}: {}",
            path.display(),
            e
        ),
    }
}

/// Returns `out_dir` joined with the source archive's file name.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use ziprepack::default_destination;
///
/// let dest = default_destination(Path::new("/srv/out"), Path::new("/data/site.zip"))?;
/// assert_eq!(dest, Path::new("/srv/out/site.zip"));
/// # Ok::<(), ziprepack::Error>(())
/// ```
pub fn default_destination(out_dir: &Path, source: &Path) -> Result<PathBuf> {
    Ok(out_dir.join(file_name(source)?))
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidArchivePath(format!("{} has no usable file name", path.display()))
        })
}
