//! Archive writing.
//!
//! [`ArchiveWriter`] encodes a sequence of [`ArchiveEntry`] values into a
//! new ZIP archive:
//!
//! | Kind | Stored name | Method | Payload |
//! |------|-------------|--------|---------|
//! | Directory | `path/` | Store | none |
//! | Regular file | `path` | Deflate | file content |
//! | Symlink | `path` | Store | link target |
//!
//! Each entry's Unix mode goes into the external attributes, so
//! extractors recreate symlinks as symlinks. Timestamps follow the writer's
//! [`TimestampPolicy`](crate::timestamp::TimestampPolicy).
//!
//! # Example
//!
//! ```rust,no_run
//! use ziprepack::walk::TreeWalker;
//! use ziprepack::write::{ArchiveWriter, WriteOptions};
//!
//! let mut writer = ArchiveWriter::create_path("site.zip", WriteOptions::default())?;
//! writer.write_entries(TreeWalker::new("/tmp/ziprepack"))?;
//! let result = writer.finish()?;
//! println!("wrote {} entries", result.total_entries());
//! # Ok::<(), ziprepack::Error>(())
//! ```

mod options;

pub use options::WriteOptions;

use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::entry::{ArchiveEntry, EntryData, EntryKind};
use crate::read::ExtractDestination;
use crate::timestamp::RunClock;
use crate::{Error, Result};

/// Summary of a written archive.
#[must_use = "write result should be checked to verify all entries were written"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Directory entries written.
    pub directories: usize,
    /// Regular file entries written.
    pub files: usize,
    /// Symlink entries written.
    pub symlinks: usize,
    /// Uncompressed bytes of regular file content.
    pub bytes_written: u64,
}

impl WriteResult {
    /// Returns the number of entries written.
    pub fn total_entries(&self) -> usize {
        self.directories + self.files + self.symlinks
    }
}

/// Writes ZIP archives entry by entry.
///
/// The run clock used for timestamps is captured once, when the writer is
/// created, so every entry of one archive agrees on "now".
///
/// A writer that returned an error must be discarded along with its
/// output; it makes no promise of a readable partial archive.
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: WriteOptions,
    clock: RunClock,
    target: PathBuf,
    result: WriteResult,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Creates (or truncates) an archive file at `path`.
    pub fn create_path(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::write_failure(path, e))?;
        let mut writer = Self::new(BufWriter::new(file), options);
        writer.target = path.to_path_buf();
        Ok(writer)
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Creates a writer over a seekable sink.
    pub fn new(sink: W, options: WriteOptions) -> Self {
        Self::with_clock(sink, options, RunClock::capture())
    }

    /// Creates a writer with an explicit run clock.
    pub fn with_clock(sink: W, options: WriteOptions, clock: RunClock) -> Self {
        Self {
            zip: ZipWriter::new(sink),
            options,
            clock,
            target: PathBuf::from("<archive>"),
            result: WriteResult::default(),
        }
    }

    /// Returns the clock timestamps are computed from.
    pub fn clock(&self) -> &RunClock {
        &self.clock
    }

    /// Appends one entry.
    pub fn add_entry(&mut self, entry: ArchiveEntry<'_>) -> Result<()> {
        let kind = entry.kind();
        let stamp = self.options.policy().resolve(entry.modified, &self.clock);
        let base = SimpleFileOptions::default()
            .last_modified_time(stamp)
            .unix_permissions(entry.permissions());

        match entry.data {
            EntryData::Directory => {
                let name = entry.path.entry_name(true);
                let options = base.compression_method(CompressionMethod::Stored);
                self.zip
                    .add_directory(name, options)
                    .map_err(|e| self.failure(e.into()))?;
            }
            EntryData::Symlink(target) => {
                let target = match String::from_utf8(target) {
                    Ok(target) => target,
                    Err(e) => {
                        log::warn!("symlink {} has a non-UTF-8 target", entry.path);
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                self.zip
                    .add_symlink(entry.path.as_str(), target, base)
                    .map_err(|e| self.failure(e.into()))?;
            }
            EntryData::File(mut content) => {
                let options = base
                    .compression_method(CompressionMethod::Deflated)
                    .compression_level(self.options.level());
                self.zip
                    .start_file(entry.path.as_str(), options)
                    .map_err(|e| self.failure(e.into()))?;
                let copied = io::copy(&mut content, &mut self.zip).map_err(|e| self.failure(e))?;
                self.result.bytes_written += copied;
            }
        }

        log::debug!("wrote {} {}", kind, entry.path);
        match kind {
            EntryKind::Directory => self.result.directories += 1,
            EntryKind::RegularFile => self.result.files += 1,
            EntryKind::Symlink => self.result.symlinks += 1,
        }
        Ok(())
    }

    /// Appends every entry of a sequence, stopping at the first error.
    pub fn write_entries<'a, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<ArchiveEntry<'a>>>,
    {
        for entry in entries {
            self.add_entry(entry?)?;
        }
        Ok(())
    }

    /// Writes the central directory and flushes the sink.
    pub fn finish(self) -> Result<WriteResult> {
        let (_, result) = self.finish_into_inner()?;
        Ok(result)
    }

    /// Like [`finish`](Self::finish), also handing back the sink.
    pub fn finish_into_inner(self) -> Result<(W, WriteResult)> {
        let target = self.target;
        let mut sink = self
            .zip
            .finish()
            .map_err(|e| Error::write_failure(&target, e.into()))?;
        sink.flush().map_err(|e| Error::write_failure(&target, e))?;
        Ok((sink, self.result))
    }

    fn failure(&self, source: io::Error) -> Error {
        Error::write_failure(&self.target, source)
    }
}

/// Lets an archive be copied straight into another archive.
impl<W: Write + Seek> ExtractDestination for ArchiveWriter<W> {
    fn write_entry(&mut self, entry: ArchiveEntry<'_>) -> Result<()> {
        self.add_entry(entry)
    }
}
