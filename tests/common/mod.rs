//! Shared test utilities for integration tests.
//!
//! Fixture archives are crafted directly with the `zip` crate so the tests
//! do not depend on the code under test to produce their inputs.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};
use ziprepack::read::{ArchiveReader, MemoryDestination, MemoryEntry};

/// Builds fixture archives entry by entry, in the order given.
pub struct ZipBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a directory entry; `name` is given without the trailing slash.
    pub fn dir(mut self, name: &str, mode: u32) -> Self {
        let options = SimpleFileOptions::default().unix_permissions(mode);
        self.writer
            .add_directory(format!("{}/", name), options)
            .unwrap();
        self
    }

    /// Adds a deflated regular file.
    pub fn file(self, name: &str, mode: u32, content: &[u8]) -> Self {
        self.file_with(name, mode, content, CompressionMethod::Deflated)
    }

    /// Adds a regular file stored without compression.
    pub fn stored_file(self, name: &str, mode: u32, content: &[u8]) -> Self {
        self.file_with(name, mode, content, CompressionMethod::Stored)
    }

    fn file_with(mut self, name: &str, mode: u32, content: &[u8], method: CompressionMethod) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(mode);
        self.writer.start_file(name, options).unwrap();
        self.writer.write_all(content).unwrap();
        self
    }

    /// Adds a symlink entry.
    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.writer
            .add_symlink(name, target, SimpleFileOptions::default())
            .unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.writer.finish().unwrap().into_inner()
    }

    /// Writes the archive to `dir/name` and returns its path.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

/// A fresh temporary directory with `in/`, `out/`, and a workspace path.
pub struct Scratch {
    pub dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("in")).unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        Self { dir }
    }

    pub fn input(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }
}

/// Reads an archive into a map keyed by entry path.
pub fn snapshot(bytes: &[u8]) -> BTreeMap<String, MemoryEntry> {
    let mut reader = ArchiveReader::open(Cursor::new(bytes)).unwrap();
    let mut dest = MemoryDestination::new();
    let _ = reader.extract_to(&mut dest).unwrap();
    dest.into_entries()
}

/// Like [`snapshot`], reading from a file.
pub fn snapshot_file(path: &Path) -> BTreeMap<String, MemoryEntry> {
    snapshot(&fs::read(path).unwrap())
}

/// Snapshot with modes reduced to type bits plus `rwxrwxrwx`.
///
/// The ZIP writer only records the low nine permission bits.
pub fn normalized(entries: BTreeMap<String, MemoryEntry>) -> BTreeMap<String, MemoryEntry> {
    entries
        .into_iter()
        .map(|(path, mut entry)| {
            entry.mode &= 0o170777;
            (path, entry)
        })
        .collect()
}

/// Storage-order names read through the central directory index.
pub fn ordered_names(path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_string())
        .collect()
}

/// Reads one entry's payload by name.
pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

/// Returns the stored compression method and Unix mode of an entry.
pub fn entry_header(path: &Path, name: &str) -> (CompressionMethod, Option<u32>) {
    let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let file = archive.by_name(name).unwrap();
    (file.compression(), file.unix_mode())
}

const LOCAL_HEADER: &[u8; 4] = b"PK\x03\x04";
const CENTRAL_HEADER: &[u8; 4] = b"PK\x01\x02";

/// Finds the header with `signature` whose file name is `name`.
///
/// `name_len_at` and `name_at` are the offsets of the name length field and
/// of the name itself within that header kind.
fn find_header(bytes: &[u8], signature: &[u8; 4], name_len_at: usize, name_at: usize, name: &str) -> usize {
    (0..bytes.len().saturating_sub(name_at))
        .find(|&at| {
            if &bytes[at..at + 4] != signature {
                return false;
            }
            let len = u16::from_le_bytes([bytes[at + name_len_at], bytes[at + name_len_at + 1]]) as usize;
            bytes.get(at + name_at..at + name_at + len) == Some(name.as_bytes())
        })
        .unwrap_or_else(|| panic!("no header for {name}"))
}

fn add_u32(bytes: &mut [u8], at: usize, delta: u32) {
    let field: [u8; 4] = bytes[at..at + 4].try_into().unwrap();
    let value = u32::from_le_bytes(field) + delta;
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Overwrites the Unix mode in the central directory record of `name`.
pub fn set_unix_mode(bytes: &mut [u8], name: &str, mode: u32) {
    let at = find_header(bytes, CENTRAL_HEADER, 28, 46, name);
    bytes[at + 38..at + 42].copy_from_slice(&(mode << 16).to_le_bytes());
}

/// Declares `name` larger than its stored payload, in both headers.
pub fn grow_declared_size(bytes: &mut [u8], name: &str, delta: u32) {
    let local = find_header(bytes, LOCAL_HEADER, 26, 30, name);
    add_u32(bytes, local + 22, delta);
    let central = find_header(bytes, CENTRAL_HEADER, 28, 46, name);
    add_u32(bytes, central + 24, delta);
}
