//! Error types for archive repacking.
//!
//! This module provides the [`Error`] enum which represents every failure
//! mode of the extract → edit → repack pipeline, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Every
//! phase stops at the first error and hands it back unchanged, so the caller
//! sees exactly one diagnostic naming the failing operation:
//!
//! ```rust,no_run
//! use ziprepack::{Error, RepackOptions, Repackager};
//!
//! fn repack(source: &str) -> ziprepack::Result<()> {
//!     let options = RepackOptions::new("/tmp/ziprepack");
//!     match Repackager::new(options).run(source, "out.zip") {
//!         Ok(result) => {
//!             println!("wrote {} entries", result.write.total_entries());
//!             Ok(())
//!         }
//!         Err(Error::MissingSource { path }) => {
//!             eprintln!("nothing to move at {}", path);
//!             Err(Error::MissingSource { path })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! # Retries
//!
//! None of the failures are transient: a corrupt input, a permission
//! problem, or a missing expected file will fail the same way again. The
//! recovery path is to fix the cause and rerun the whole pipeline, which
//! recreates the workspace from the untouched source archive.

use std::io;
use std::path::PathBuf;

/// The main error type for repacking operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Input archive | [`ArchiveCorrupt`][Self::ArchiveCorrupt], [`EntryReadFailure`][Self::EntryReadFailure] | Damaged or truncated ZIP |
/// | Materializing | [`SymlinkCreateFailure`][Self::SymlinkCreateFailure], [`WriteFailure`][Self::WriteFailure] | Filesystem refuses a write |
/// | Editing | [`MissingSource`][Self::MissingSource], [`MissingTarget`][Self::MissingTarget], [`DestinationConflict`][Self::DestinationConflict], [`PatternNotFound`][Self::PatternNotFound] | Plan does not match the tree |
/// | Configuration | [`InvalidArchivePath`][Self::InvalidArchivePath], [`InvalidPlan`][Self::InvalidPlan] | Bad names or plan data |
/// | Security | [`PathTraversal`][Self::PathTraversal] | Symlink redirecting a later path |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error outside the classified failure kinds.
    ///
    /// Returned for opening the source archive file and preparing the
    /// scratch workspace.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive's central directory could not be parsed.
    #[error("Corrupt archive: {reason}")]
    ArchiveCorrupt {
        /// Description of what the ZIP parser rejected.
        reason: String,
    },

    /// An individual entry's stream could not be opened or fully consumed.
    ///
    /// This includes a symlink entry whose payload is shorter than the size
    /// declared in its header.
    #[error("Failed to read entry '{path}': {source}")]
    EntryReadFailure {
        /// Name of the entry inside the archive.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The host filesystem rejected a symbolic link.
    #[error("Failed to create symlink {} -> {target}: {source}", .path.display())]
    SymlinkCreateFailure {
        /// Where the link was to be created.
        path: PathBuf,
        /// The link target.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing to the workspace or to the destination archive failed.
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailure {
        /// The file or archive being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A rename operation found nothing at its source path.
    #[error("Rename source not found: {path}")]
    MissingSource {
        /// The missing source path, relative to the edit root.
        path: String,
    },

    /// A patch or delete operation found nothing at its target path.
    #[error("Edit target not found: {path}")]
    MissingTarget {
        /// The missing path, relative to the edit root.
        path: String,
    },

    /// A rename operation would overwrite an existing entry.
    #[error("Rename destination already exists: {path}")]
    DestinationConflict {
        /// The occupied destination path, relative to the edit root.
        path: String,
    },

    /// A patch's search string does not occur in its target file.
    ///
    /// Only raised under [`MissingPatternPolicy::Fail`]; the default policy
    /// leaves the file untouched instead.
    ///
    /// [`MissingPatternPolicy::Fail`]: crate::edit::MissingPatternPolicy::Fail
    #[error("Pattern not found in {path}: {pattern:?}")]
    PatternNotFound {
        /// The patched file, relative to the edit root.
        path: String,
        /// The search string that was not found.
        pattern: String,
    },

    /// An archive or operation path is invalid.
    ///
    /// Archive paths must:
    /// - Not contain null bytes
    /// - Not be empty
    /// - Not be absolute
    /// - Not contain `.`, `..`, or empty segments
    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// An edit plan is malformed.
    #[error("Invalid edit plan: {0}")]
    InvalidPlan(String),

    /// A path would reach outside its root through a symbolic link.
    ///
    /// Raised when an entry or edit operation names a path below a symlink
    /// already in the tree, or would write through a symlink in place.
    #[error("Path {path} passes through symlink {link}")]
    PathTraversal {
        /// The offending path, relative to the root.
        path: String,
        /// The symlink in the way, relative to the root.
        link: String,
    },
}

impl Error {
    /// Returns `true` if an edit operation referred to a path that does not exist.
    pub fn is_missing_path(&self) -> bool {
        matches!(
            self,
            Error::MissingSource { .. } | Error::MissingTarget { .. }
        )
    }

    /// Returns `true` if the input archive itself is at fault.
    pub fn is_archive_error(&self) -> bool {
        matches!(
            self,
            Error::ArchiveCorrupt { .. } | Error::EntryReadFailure { .. }
        )
    }

    /// Returns `true` if a path was refused for escaping its root.
    pub fn is_path_traversal(&self) -> bool {
        matches!(self, Error::PathTraversal { .. })
    }

    /// Returns the path associated with this error, if any.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ziprepack::Error;
    ///
    /// let error = Error::MissingTarget { path: "install.sh".into() };
    /// assert_eq!(error.path().as_deref(), Some("install.sh"));
    /// ```
    pub fn path(&self) -> Option<String> {
        match self {
            Error::EntryReadFailure { path, .. }
            | Error::MissingSource { path }
            | Error::MissingTarget { path }
            | Error::DestinationConflict { path }
            | Error::PatternNotFound { path, .. }
            | Error::PathTraversal { path, .. } => Some(path.clone()),
            Error::SymlinkCreateFailure { path, .. } | Error::WriteFailure { path, .. } => {
                Some(path.display().to_string())
            }
            _ => None,
        }
    }

    /// Creates a WriteFailure error.
    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::WriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Creates an EntryReadFailure error.
    pub(crate) fn entry_read(path: impl Into<String>, source: io::Error) -> Self {
        Error::EntryReadFailure {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::ArchiveCorrupt {
                reason: other.to_string(),
            },
        }
    }
}

/// A specialized Result type for repacking operations.
pub type Result<T> = std::result::Result<T, Error>;
