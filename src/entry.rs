//! The entry triple shared by every pipeline phase.
//!
//! Both the [`ArchiveReader`](crate::read::ArchiveReader) and the
//! [`TreeWalker`](crate::walk::TreeWalker) produce [`ArchiveEntry`] values;
//! the materializer and the [`ArchiveWriter`](crate::write::ArchiveWriter)
//! consume them. An entry lives only for the duration of one streaming pass:
//! regular file content is a borrowed reader, not a buffer.

use std::fmt;
use std::io::Read;

use chrono::NaiveDateTime;

use crate::ArchivePath;

/// Mask selecting the file type bits of a Unix mode.
pub const S_IFMT: u32 = 0o170000;
/// File type bits of a directory.
pub const S_IFDIR: u32 = 0o040000;
/// File type bits of a regular file.
pub const S_IFREG: u32 = 0o100000;
/// File type bits of a symbolic link.
pub const S_IFLNK: u32 = 0o120000;
/// Mask selecting the permission bits (including setuid/setgid/sticky).
pub const PERMISSION_MASK: u32 = 0o7777;

/// Default mode for directories whose archive entry carries no Unix mode.
pub const DEFAULT_DIR_MODE: u32 = S_IFDIR | 0o755;
/// Default mode for files whose archive entry carries no Unix mode.
pub const DEFAULT_FILE_MODE: u32 = S_IFREG | 0o644;
/// Default mode for symbolic links.
pub const DEFAULT_SYMLINK_MODE: u32 = S_IFLNK | 0o777;

/// The kind of filesystem node an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A directory.
    Directory,
    /// A regular file.
    RegularFile,
    /// A symbolic link.
    Symlink,
}

impl EntryKind {
    /// Classifies a full Unix mode (type and permission bits).
    ///
    /// Returns `None` for anything that is not a directory, symlink, or
    /// regular file (devices, FIFOs, sockets).
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFDIR => Some(Self::Directory),
            S_IFLNK => Some(Self::Symlink),
            S_IFREG => Some(Self::RegularFile),
            _ => None,
        }
    }

    /// Returns the Unix file type bits for this kind.
    pub fn type_bits(&self) -> u32 {
        match self {
            Self::Directory => S_IFDIR,
            Self::RegularFile => S_IFREG,
            Self::Symlink => S_IFLNK,
        }
    }

    /// Returns a short lowercase name, for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::RegularFile => "file",
            Self::Symlink => "symlink",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of an entry, shaped by its kind.
pub enum EntryData<'a> {
    /// Directories carry no content.
    Directory,
    /// The link target as raw bytes, captured in full.
    Symlink(Vec<u8>),
    /// A stream over the file's content.
    File(Box<dyn Read + 'a>),
}

impl fmt::Debug for EntryData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("Directory"),
            Self::Symlink(target) => f
                .debug_tuple("Symlink")
                .field(&String::from_utf8_lossy(target))
                .finish(),
            Self::File(_) => f.write_str("File(..)"),
        }
    }
}

/// One node of an archive or of a workspace tree.
///
/// The path is always slash-separated and free of `..` segments, regardless
/// of the host platform.
#[derive(Debug)]
pub struct ArchiveEntry<'a> {
    /// Path relative to the archive root.
    pub path: ArchivePath,
    /// Full Unix mode: file type bits plus permission bits.
    pub mode: u32,
    /// Modification time recorded for the entry, if known.
    pub modified: Option<NaiveDateTime>,
    /// The entry's content.
    pub data: EntryData<'a>,
}

impl<'a> ArchiveEntry<'a> {
    /// Creates a directory entry.
    pub fn directory(path: ArchivePath, mode: u32) -> Self {
        Self {
            path,
            mode: S_IFDIR | (mode & PERMISSION_MASK),
            modified: None,
            data: EntryData::Directory,
        }
    }

    /// Creates a symlink entry pointing at `target`.
    pub fn symlink(path: ArchivePath, mode: u32, target: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            mode: S_IFLNK | (mode & PERMISSION_MASK),
            modified: None,
            data: EntryData::Symlink(target.into()),
        }
    }

    /// Creates a regular file entry streaming from `reader`.
    pub fn file(path: ArchivePath, mode: u32, reader: impl Read + 'a) -> Self {
        Self {
            path,
            mode: S_IFREG | (mode & PERMISSION_MASK),
            modified: None,
            data: EntryData::File(Box::new(reader)),
        }
    }

    /// Sets the modification time.
    pub fn with_modified(mut self, modified: Option<NaiveDateTime>) -> Self {
        self.modified = modified;
        self
    }

    /// Returns the entry kind.
    pub fn kind(&self) -> EntryKind {
        match self.data {
            EntryData::Directory => EntryKind::Directory,
            EntryData::Symlink(_) => EntryKind::Symlink,
            EntryData::File(_) => EntryKind::RegularFile,
        }
    }

    /// Returns the permission bits of the mode.
    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_MASK
    }

    /// Returns the link target if this is a symlink.
    pub fn link_target(&self) -> Option<&[u8]> {
        match &self.data {
            EntryData::Symlink(target) => Some(target),
            _ => None,
        }
    }
}
