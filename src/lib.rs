//! # ziprepack
//!
//! Extract a ZIP archive, edit the extracted tree, and pack it up again.
//!
//! The round trip keeps what matters to ZIP consumers on Unix: directory
//! entries, symlink entries (as symlinks, not as files holding a path), and
//! file modes. Timestamps are normalized on the way out.
//!
//! ## Quick Start
//!
//! ### Repacking with Edits
//!
//! ```rust,no_run
//! use ziprepack::edit::EditPlan;
//! use ziprepack::{RepackOptions, Repackager, Result};
//!
//! fn main() -> Result<()> {
//!     let plan = EditPlan::builder()
//!         .rename("html/index.php", "index.php")?
//!         .patch("index.php", "define('DEBUG', true)", "define('DEBUG', false)")?
//!         .delete("install.sh")?
//!         .build();
//!
//!     let options = RepackOptions::new("/tmp/ziprepack").plan(plan);
//!     let result = Repackager::new(options).run_to_dir("site.zip", ".")?;
//!
//!     println!(
//!         "{} edits, {} entries written",
//!         result.edit.changes(),
//!         result.write.total_entries()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ### Loading the Plan from JSON
//!
//! ```rust,no_run
//! use ziprepack::edit::EditPlan;
//! use ziprepack::{RepackOptions, Repackager, Subtree};
//!
//! // {"operations": [{"op": "delete", "path": "install.sh"}]}
//! let plan = EditPlan::from_json_path("plan.json")?;
//! let options = RepackOptions::new("/tmp/ziprepack")
//!     .plan(plan)
//!     .subtree(Subtree::ArchiveStem);
//! Repackager::new(options).run("site.zip", "site-patched.zip")?;
//! # Ok::<(), ziprepack::Error>(())
//! ```
//!
//! ### Using the Phases Directly
//!
//! Each phase is usable on its own:
//!
//! ```rust,no_run
//! use ziprepack::read::{ArchiveReader, FilesystemDestination};
//! use ziprepack::walk::TreeWalker;
//! use ziprepack::write::{ArchiveWriter, WriteOptions};
//!
//! let mut reader = ArchiveReader::open_path("in.zip")?;
//! let _ = reader.extract_to(&mut FilesystemDestination::new("work"))?;
//!
//! let mut writer = ArchiveWriter::create_path("out.zip", WriteOptions::default())?;
//! writer.write_entries(TreeWalker::new("work"))?;
//! let _ = writer.finish()?;
//! # Ok::<(), ziprepack::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `serde` | Yes | `Serialize`/`Deserialize` for edit plans, JSON loading |
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger itself.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive_path;
pub mod edit;
pub mod entry;
pub mod error;
mod path_safety;
pub mod pipeline;
pub mod read;
pub mod timestamp;
pub mod walk;
pub mod workspace;
pub mod write;

pub use archive_path::ArchivePath;
pub use entry::{ArchiveEntry, EntryData, EntryKind};
pub use error::{Error, Result};
pub use pipeline::{RepackOptions, RepackResult, Repackager, Subtree, default_destination};

pub use edit::{EditPlan, EditResult, MissingPatternPolicy, Operation, TreeEditor};
pub use read::{ArchiveReader, ExtractDestination, ExtractResult, FilesystemDestination};
pub use timestamp::TimestampPolicy;
pub use walk::TreeWalker;
pub use workspace::CleanupPolicy;
pub use write::{ArchiveWriter, WriteOptions, WriteResult};
