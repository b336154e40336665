//! Streaming ZIP entry reader.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::ZipArchive;
use zip::read::ZipFile;

use crate::entry::{
    ArchiveEntry, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, EntryData, EntryKind, PERMISSION_MASK,
    S_IFDIR, S_IFMT, S_IFREG,
};
use crate::timestamp::from_zip_datetime;
use crate::{ArchivePath, Error, Result};

use super::destination::ExtractDestination;

/// Summary of an extraction pass.
#[must_use = "extract result should be checked to verify all entries were handled"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractResult {
    /// Directory entries materialized.
    pub directories: usize,
    /// Regular file entries materialized.
    pub files: usize,
    /// Symlink entries materialized.
    pub symlinks: usize,
    /// Entries of unsupported kinds that were skipped.
    pub skipped: usize,
}

impl ExtractResult {
    /// Returns the number of entries materialized.
    pub fn total_entries(&self) -> usize {
        self.directories + self.files + self.symlinks
    }

    fn record(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::Directory => self.directories += 1,
            EntryKind::RegularFile => self.files += 1,
            EntryKind::Symlink => self.symlinks += 1,
        }
    }
}

/// Reads the entries of a ZIP archive in storage order.
///
/// Entries are produced lazily, one at a time, each borrowing the reader
/// until it is dropped. A pass cannot be resumed halfway; open the archive
/// again to start over.
///
/// # Example
///
/// ```rust,no_run
/// use ziprepack::read::ArchiveReader;
///
/// let mut reader = ArchiveReader::open_path("site.zip")?;
/// let mut entries = reader.entries();
/// while let Some(entry) = entries.next_entry() {
///     let entry = entry?;
///     println!("{} {:o} {}", entry.kind(), entry.mode, entry.path);
/// }
/// # Ok::<(), ziprepack::Error>(())
/// ```
pub struct ArchiveReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl ArchiveReader<BufReader<File>> {
    /// Opens an archive from a file path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Opens an archive from a seekable reader.
    ///
    /// Fails with [`Error::ArchiveCorrupt`] if the central directory cannot
    /// be parsed.
    pub fn open(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader).map_err(|e| Error::ArchiveCorrupt {
            reason: e.to_string(),
        })?;
        Ok(Self { archive })
    }

    /// Returns the number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Starts a pass over the archive's entries.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            archive: &mut self.archive,
            index: 0,
            skipped: 0,
        }
    }

    /// Materializes every entry into `dest`, in archive order.
    ///
    /// The first failing entry aborts the whole pass. The destination's
    /// [`on_finish`](ExtractDestination::on_finish) hook runs either way.
    pub fn extract_to(&mut self, dest: &mut dyn ExtractDestination) -> Result<ExtractResult> {
        let mut result = ExtractResult::default();
        let mut entries = self.entries();
        let outcome = loop {
            let Some(entry) = entries.next_entry() else {
                break Ok(());
            };
            let written = entry.and_then(|entry| {
                let kind = entry.kind();
                dest.write_entry(entry).map(|()| kind)
            });
            match written {
                Ok(kind) => result.record(kind),
                Err(e) => break Err(e),
            }
        };
        result.skipped = entries.skipped();

        match outcome {
            Ok(()) => {
                dest.on_finish(true)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(finish_err) = dest.on_finish(false) {
                    log::warn!("cleanup after failed extraction: {}", finish_err);
                }
                Err(e)
            }
        }
    }
}

/// A single pass over an archive's entries.
///
/// Not an [`Iterator`]: each entry borrows the pass, so it must be dropped
/// before the next one is requested.
pub struct Entries<'a, R: Read + Seek> {
    archive: &'a mut ZipArchive<R>,
    index: usize,
    skipped: usize,
}

impl<R: Read + Seek> Entries<'_, R> {
    /// Returns the next supported entry, or `None` when the pass is done.
    ///
    /// Entries that are neither directories, symlinks, nor regular files
    /// are skipped silently.
    pub fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_>>> {
        loop {
            if self.index >= self.archive.len() {
                return None;
            }
            let index = self.index;
            self.index += 1;

            let kind = match self.archive.by_index_raw(index) {
                Ok(file) => classify(&file),
                Err(e) => return Some(Err(read_failure(index, e))),
            };
            match kind {
                Some(_) => break,
                None => {
                    self.skipped += 1;
                    continue;
                }
            }
        }

        let index = self.index - 1;
        let file = match self.archive.by_index(index) {
            Ok(file) => file,
            Err(e) => return Some(Err(read_failure(index, e))),
        };
        Some(convert(file))
    }

    /// Returns how many entries have been skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn read_failure(index: usize, err: zip::result::ZipError) -> Error {
    Error::entry_read(format!("#{}", index), err.into())
}

/// Returns the entry's full Unix mode, synthesizing one for archives
/// written without Unix attributes.
fn entry_mode(file: &ZipFile<'_>) -> u32 {
    match file.unix_mode() {
        Some(mode) if mode & S_IFMT != 0 => mode,
        Some(mode) if mode & PERMISSION_MASK != 0 => {
            let type_bits = if file.is_dir() { S_IFDIR } else { S_IFREG };
            type_bits | (mode & PERMISSION_MASK)
        }
        _ if file.is_dir() => DEFAULT_DIR_MODE,
        _ => DEFAULT_FILE_MODE,
    }
}

fn classify(file: &ZipFile<'_>) -> Option<EntryKind> {
    let kind = EntryKind::from_mode(entry_mode(file));
    if kind.is_none() {
        log::debug!(
            "skipping '{}' with unsupported mode {:o}",
            file.name(),
            entry_mode(file)
        );
    }
    kind
}

fn convert(mut file: ZipFile<'_>) -> Result<ArchiveEntry<'_>> {
    let name = file.name().to_string();
    let mode = entry_mode(&file);
    let modified = file.last_modified().and_then(from_zip_datetime);
    let path = ArchivePath::from_entry_name(&name)?;

    let data = match EntryKind::from_mode(mode) {
        Some(EntryKind::Directory) => EntryData::Directory,
        Some(EntryKind::Symlink) => {
            let size = usize::try_from(file.size()).map_err(|_| {
                Error::entry_read(&name, std::io::Error::other("symlink target too large"))
            })?;
            let mut target = vec![0u8; size];
            // read_exact keeps reading until the declared size is filled.
            file.read_exact(&mut target)
                .map_err(|e| Error::entry_read(&name, e))?;
            EntryData::Symlink(target)
        }
        Some(EntryKind::RegularFile) => EntryData::File(Box::new(EntryStream { name, file })),
        None => {
            return Err(Error::entry_read(
                &name,
                std::io::Error::other(format!("unsupported mode {:o}", mode)),
            ));
        }
    };

    log::debug!("read {:o} {}", mode, path);

    Ok(ArchiveEntry {
        path,
        mode,
        modified,
        data,
    })
}

/// Wraps an entry stream so read errors name the entry.
struct EntryStream<'a> {
    name: String,
    file: ZipFile<'a>,
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf).map_err(|source| {
            std::io::Error::new(
                source.kind(),
                EntryStreamError {
                    name: self.name.clone(),
                    source,
                },
            )
        })
    }
}

/// A read error raised by an archive entry's content stream.
#[derive(Debug, thiserror::Error)]
#[error("entry '{name}': {source}")]
pub(crate) struct EntryStreamError {
    name: String,
    #[source]
    source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build(f: impl FnOnce(&mut ZipWriter<Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        f(&mut writer);
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_reads_entries_in_storage_order() {
        let bytes = build(|w| {
            let opts = SimpleFileOptions::default();
            w.add_directory("html/", opts).unwrap();
            w.start_file("html/index.php", opts.unix_permissions(0o644))
                .unwrap();
            w.write_all(b"<?php echo 1;").unwrap();
            w.add_symlink("latest", "html", opts).unwrap();
        });

        let mut reader = ArchiveReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 3);

        let mut seen = Vec::new();
        let mut entries = reader.entries();
        while let Some(entry) = entries.next_entry() {
            let entry = entry.unwrap();
            let kind = entry.kind();
            let path = entry.path.as_str().to_string();
            let payload = match entry.data {
                EntryData::Directory => Vec::new(),
                EntryData::Symlink(target) => target,
                EntryData::File(mut r) => {
                    let mut buf = Vec::new();
                    r.read_to_end(&mut buf).unwrap();
                    buf
                }
            };
            seen.push((path, kind, payload));
        }

        assert_eq!(
            seen,
            vec![
                ("html".to_string(), EntryKind::Directory, Vec::new()),
                (
                    "html/index.php".to_string(),
                    EntryKind::RegularFile,
                    b"<?php echo 1;".to_vec()
                ),
                ("latest".to_string(), EntryKind::Symlink, b"html".to_vec()),
            ]
        );
    }

    #[test]
    fn test_regular_file_mode_preserved() {
        let bytes = build(|w| {
            w.start_file("run.sh", SimpleFileOptions::default().unix_permissions(0o755))
                .unwrap();
            w.write_all(b"#!/bin/sh\n").unwrap();
        });
        let mut reader = ArchiveReader::open(Cursor::new(bytes)).unwrap();
        let mut entries = reader.entries();
        let entry = entries.next_entry().unwrap().unwrap();
        assert_eq!(entry.mode, 0o100755);
    }

    #[test]
    fn test_corrupt_archive_rejected() {
        let result = ArchiveReader::open(Cursor::new(b"definitely not a zip".to_vec()));
        assert!(matches!(result, Err(Error::ArchiveCorrupt { .. })));
    }

    #[test]
    fn test_traversal_name_rejected() {
        let bytes = build(|w| {
            w.start_file("../escape.txt", SimpleFileOptions::default())
                .unwrap();
            w.write_all(b"x").unwrap();
        });
        let mut reader = ArchiveReader::open(Cursor::new(bytes)).unwrap();
        let mut entries = reader.entries();
        let result = entries.next_entry().unwrap();
        assert!(matches!(result, Err(Error::InvalidArchivePath(_))));
    }

    #[test]
    fn test_empty_archive() {
        let bytes = build(|_| {});
        let mut reader = ArchiveReader::open(Cursor::new(bytes)).unwrap();
        assert!(reader.is_empty());
        assert!(reader.entries().next_entry().is_none());
    }
}
