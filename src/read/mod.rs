//! Archive reading and extraction.
//!
//! This module covers the first half of the round trip: reading a ZIP's
//! entries in storage order ([`ArchiveReader`]) and reproducing them
//! somewhere ([`ExtractDestination`]), normally a scratch workspace on disk
//! ([`FilesystemDestination`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use ziprepack::read::{ArchiveReader, FilesystemDestination};
//!
//! let mut reader = ArchiveReader::open_path("site.zip")?;
//! let mut dest = FilesystemDestination::new("/tmp/ziprepack");
//! let result = reader.extract_to(&mut dest)?;
//! println!(
//!     "{} dirs, {} files, {} symlinks, {} skipped",
//!     result.directories, result.files, result.symlinks, result.skipped
//! );
//! # Ok::<(), ziprepack::Error>(())
//! ```
//!
//! # Entry Classification
//!
//! The Unix mode stored in each entry's external attributes decides its
//! kind. Entries written by tools that record no Unix mode are directories
//! when their name ends in `/` and regular files otherwise. Device nodes,
//! FIFOs, and sockets are skipped without error.

mod destination;
mod reader;

pub use destination::{ExtractDestination, FilesystemDestination, MemoryDestination, MemoryEntry};
pub use reader::{ArchiveReader, Entries, ExtractResult};
