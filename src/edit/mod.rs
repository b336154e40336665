//! Editing the materialized tree.
//!
//! An [`EditPlan`] is an ordered list of three kinds of [`Operation`]:
//! - Rename: move a node, keeping its mode
//! - Patch: replace the first literal occurrence of a string in a file
//! - Delete: remove a file
//!
//! A [`TreeEditor`] applies a plan to a directory on disk, stopping at the
//! first failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use ziprepack::edit::{EditPlan, MissingPatternPolicy, TreeEditor};
//!
//! let plan = EditPlan::from_json_path("plan.json")?;
//! let result = TreeEditor::new("/tmp/ziprepack/site")
//!     .missing_pattern(MissingPatternPolicy::Fail)
//!     .apply(&plan)?;
//!
//! println!(
//!     "renamed {}, patched {}, deleted {}",
//!     result.renamed, result.patched, result.deleted
//! );
//! # Ok::<(), ziprepack::Error>(())
//! ```

mod editor;
mod operation;

pub use editor::{EditResult, MissingPatternPolicy, TreeEditor};
pub use operation::{DeleteOp, EditPlan, EditPlanBuilder, Operation, PatchOp, RenameOp};
