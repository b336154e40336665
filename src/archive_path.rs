//! Archive path type with validation for secure path handling.

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Maximum length for archive paths (in bytes).
///
/// ZIP stores name lengths in a 16-bit field, so anything longer cannot be
/// written back out.
const MAX_PATH_LENGTH: usize = u16::MAX as usize;

/// A validated archive path that ensures security against path traversal attacks.
///
/// `ArchivePath` always uses forward slashes, independent of the host
/// filesystem, and validates that:
/// - No NUL bytes are present
/// - The path is not absolute (does not start with `/`)
/// - No empty segments exist (no `//`)
/// - No `.` or `..` segments are present (prevents path traversal)
///
/// Directory entry names in a ZIP carry a trailing `/`; that marker is not
/// part of the path and is stripped by [`ArchivePath::from_entry_name`].
///
/// # Examples
///
/// ```
/// use ziprepack::ArchivePath;
///
/// let path = ArchivePath::new("html/index.php").unwrap();
/// assert_eq!(path.as_str(), "html/index.php");
///
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::new("/absolute/path").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Creates a new `ArchivePath` from a string, validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path:
    /// - Contains NUL bytes
    /// - Is an absolute path (starts with `/`)
    /// - Contains empty segments (e.g., `a//b`) or a trailing slash
    /// - Contains `.` or `..` segments
    /// - Is empty
    pub fn new(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Creates an `ArchivePath` from a raw ZIP entry name.
    ///
    /// A single trailing `/` (the directory marker) is removed before
    /// validation. Backslashes written by some Windows tools are treated as
    /// separators.
    pub fn from_entry_name(name: &str) -> Result<Self> {
        let normalized = name.replace('\\', "/");
        let trimmed = normalized.strip_suffix('/').unwrap_or(&normalized);
        Self::new(trimmed)
    }

    /// Creates an `ArchivePath` from a relative filesystem path.
    ///
    /// Only normal components are accepted; the result is joined with `/`
    /// whatever the host separator is.
    pub fn from_relative_path(path: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        Error::InvalidArchivePath(format!(
                            "non-UTF-8 name in {}",
                            path.display()
                        ))
                    })?;
                    segments.push(name);
                }
                _ => {
                    return Err(Error::InvalidArchivePath(format!(
                        "not a plain relative path: {}",
                        path.display()
                    )));
                }
            }
        }
        Self::new(&segments.join("/"))
    }

    /// Validates an archive path string.
    fn validate(s: &str) -> Result<()> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        if s.starts_with('/') {
            return Err(Error::InvalidArchivePath(format!(
                "absolute path not allowed: {}",
                s
            )));
        }

        for segment in s.split('/') {
            match segment {
                "" => {
                    return Err(Error::InvalidArchivePath(format!(
                        "empty segment in {}",
                        s
                    )));
                }
                "." => {
                    return Err(Error::InvalidArchivePath(format!(
                        "'.' segment not allowed in {}",
                        s
                    )));
                }
                ".." => {
                    return Err(Error::InvalidArchivePath(format!(
                        "'..' segment not allowed in {}",
                        s
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name to store in a ZIP header for an entry of this path.
    ///
    /// Directories get the trailing `/` marker.
    pub fn entry_name(&self, is_directory: bool) -> String {
        if is_directory {
            format!("{}/", self.0)
        } else {
            self.0.clone()
        }
    }

    /// Resolves this path beneath a filesystem root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }

    /// Returns the parent directory of this path, if any.
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns the file name (last segment) of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns an iterator over the path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ArchivePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArchivePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ArchivePath> for String {
    fn from(path: ArchivePath) -> Self {
        path.0
    }
}
