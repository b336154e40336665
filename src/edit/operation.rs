//! Edit operations and ordered edit plans.

use crate::{ArchivePath, Error, Result};

/// Moves one node to a new path within the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenameOp {
    /// Existing path.
    pub from: ArchivePath,
    /// New path. Its parent directory must already exist.
    pub to: ArchivePath,
}

/// Replaces the first literal occurrence of `search` in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchOp {
    /// The file to patch.
    pub path: ArchivePath,
    /// Exact text to find. Must not be empty.
    pub search: String,
    /// Text substituted for the first match.
    pub replace: String,
}

/// Removes one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeleteOp {
    /// The file to remove.
    pub path: ArchivePath,
}

/// A single edit against the materialized tree.
///
/// In JSON form an operation is an object tagged with `"op"`:
///
/// ```json
/// {"op": "rename", "from": "html/index.php", "to": "index.php"}
/// {"op": "patch", "path": "index.php", "search": "A", "replace": "B"}
/// {"op": "delete", "path": "install.sh"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "lowercase"))]
pub enum Operation {
    /// Move a node.
    Rename(RenameOp),
    /// Substitute text inside a file.
    Patch(PatchOp),
    /// Remove a file.
    Delete(DeleteOp),
}

impl Operation {
    /// Returns the path this operation reads from or acts on.
    pub fn source_path(&self) -> &ArchivePath {
        match self {
            Operation::Rename(op) => &op.from,
            Operation::Patch(op) => &op.path,
            Operation::Delete(op) => &op.path,
        }
    }

    /// Returns the operation type as a string.
    pub fn operation_type(&self) -> &'static str {
        match self {
            Operation::Rename(_) => "rename",
            Operation::Patch(_) => "patch",
            Operation::Delete(_) => "delete",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Operation::Patch(op) if op.search.is_empty() => Err(Error::InvalidPlan(format!(
                "patch of {} has an empty search string",
                op.path
            ))),
            Operation::Rename(op) if op.from == op.to => Err(Error::InvalidPlan(format!(
                "rename of {} onto itself",
                op.from
            ))),
            _ => Ok(()),
        }
    }
}

impl From<RenameOp> for Operation {
    fn from(op: RenameOp) -> Self {
        Operation::Rename(op)
    }
}

impl From<PatchOp> for Operation {
    fn from(op: PatchOp) -> Self {
        Operation::Patch(op)
    }
}

impl From<DeleteOp> for Operation {
    fn from(op: DeleteOp) -> Self {
        Operation::Delete(op)
    }
}

/// An ordered list of edit operations.
///
/// Operations run exactly once each, in list order. A plan is plain data:
/// the pipeline is generic over it, and with the `serde` feature it can be
/// kept in a JSON file.
///
/// # Example
///
/// ```rust
/// use ziprepack::edit::EditPlan;
///
/// let plan = EditPlan::builder()
///     .rename("html/index.php", "index.php")?
///     .patch("index.php", "A", "B")?
///     .delete("install.sh")?
///     .build();
/// assert_eq!(plan.len(), 3);
/// # Ok::<(), ziprepack::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EditPlan {
    operations: Vec<Operation>,
}

impl EditPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder for composing a plan in any order.
    pub fn builder() -> EditPlanBuilder {
        EditPlanBuilder::default()
    }

    /// Builds the standard phase order: every rename, then every patch,
    /// then every delete.
    pub fn from_phases(
        renames: impl IntoIterator<Item = RenameOp>,
        patches: impl IntoIterator<Item = PatchOp>,
        deletes: impl IntoIterator<Item = DeleteOp>,
    ) -> Self {
        let operations = renames
            .into_iter()
            .map(Operation::from)
            .chain(patches.into_iter().map(Operation::from))
            .chain(deletes.into_iter().map(Operation::from))
            .collect();
        Self { operations }
    }

    /// Parses a plan from JSON text.
    ///
    /// The expected shape is `{"operations": [ ... ]}`; see [`Operation`]
    /// for the form of each element.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let plan: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reads and parses a JSON plan file.
    #[cfg(feature = "serde")]
    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Serializes the plan to pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidPlan(e.to_string()))
    }

    /// Appends an operation.
    pub fn push(&mut self, op: impl Into<Operation>) {
        self.operations.push(op.into());
    }

    /// Returns the operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the plan does nothing.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Checks the plan for operations that can never succeed.
    ///
    /// Rejects patches with an empty search string and renames onto the
    /// same path. Nothing on disk is consulted.
    pub fn validate(&self) -> Result<()> {
        self.operations.iter().try_for_each(Operation::validate)
    }
}

impl FromIterator<Operation> for EditPlan {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EditPlan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Builder for creating plans fluently.
///
/// Each step validates its paths, so the chain is written with `?`.
#[derive(Debug, Default)]
pub struct EditPlanBuilder {
    operations: Vec<Operation>,
}

impl EditPlanBuilder {
    /// Adds a rename operation.
    pub fn rename(mut self, from: &str, to: &str) -> Result<Self> {
        self.operations.push(Operation::Rename(RenameOp {
            from: ArchivePath::new(from)?,
            to: ArchivePath::new(to)?,
        }));
        Ok(self)
    }

    /// Adds a patch operation.
    pub fn patch(
        mut self,
        path: &str,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Result<Self> {
        self.operations.push(Operation::Patch(PatchOp {
            path: ArchivePath::new(path)?,
            search: search.into(),
            replace: replace.into(),
        }));
        Ok(self)
    }

    /// Adds a delete operation.
    pub fn delete(mut self, path: &str) -> Result<Self> {
        self.operations.push(Operation::Delete(DeleteOp {
            path: ArchivePath::new(path)?,
        }));
        Ok(self)
    }

    /// Adds an already-built operation.
    pub fn operation(mut self, op: impl Into<Operation>) -> Self {
        self.operations.push(op.into());
        self
    }

    /// Builds the plan.
    pub fn build(self) -> EditPlan {
        EditPlan {
            operations: self.operations,
        }
    }
}
