//! engine::flatten
//!
//! Linearization of the uplift tree.

use serde::Serialize;

use super::tree::UpliftTree;
use crate::core::types::Oid;
use crate::git::CommitInfo;

/// One step of the flattened history.
///
/// At least one slot is filled. Entries expanded from the same frontend
/// commit are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinearEntry {
    pub frontend: Option<CommitInfo>,
    pub core: Option<CommitInfo>,
    pub base: Option<CommitInfo>,
}

impl LinearEntry {
    /// Key of the rewritten core commit this entry maps to.
    pub fn remap_key(&self) -> Option<RemapKey> {
        self.core.as_ref().map(|core| RemapKey {
            core: core.oid.clone(),
            base: self.base.as_ref().map(|b| b.oid.clone()),
        })
    }
}

/// Original (core, base) pair identifying a rewritten core commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RemapKey {
    pub core: Oid,
    pub base: Option<Oid>,
}

/// Flatten `tree` into chronological entries.
///
/// With `fe_only`, core commits are never split by the base commits they
/// subsume.
///
/// # Example
///
/// ```ignore
/// let tree = UpliftTree::assemble(fe_commits, &mappings);
/// for entry in flatten(&tree, false) {
///     println!("{:?}", entry.remap_key());
/// }
/// ```
pub fn flatten(tree: &UpliftTree, fe_only: bool) -> Vec<LinearEntry> {
    let mut entries = Vec::new();

    for node in &tree.nodes {
        if node.core.is_empty() {
            entries.push(LinearEntry {
                frontend: Some(node.commit.clone()),
                core: None,
                base: None,
            });
            continue;
        }

        for core in &node.core {
            if fe_only || core.base.is_empty() {
                entries.push(LinearEntry {
                    frontend: Some(node.commit.clone()),
                    core: Some(core.commit.clone()),
                    base: None,
                });
                continue;
            }

            entries.extend(core.base.iter().map(|base| LinearEntry {
                frontend: Some(node.commit.clone()),
                core: Some(core.commit.clone()),
                base: Some(base.clone()),
            }));
        }
    }

    entries
}
