//! Committee tree.

use alloy_primitives::B256;

/// A fully built committee tree.
///
/// `levels[0]` holds the padded leaves and the last level holds the root.
/// An empty roster produces a tree with no levels and no root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeTree {
    leaf_count: usize,
    levels: Vec<Vec<B256>>,
}

impl CommitteeTree {
    /// Tree over an empty roster.
    pub(crate) fn empty() -> Self {
        Self {
            leaf_count: 0,
            levels: Vec::new(),
        }
    }

    pub(crate) fn from_levels(leaf_count: usize, levels: Vec<Vec<B256>>) -> Self {
        Self { leaf_count, levels }
    }

    /// Root of the tree, or `None` for an empty roster.
    pub fn root(&self) -> Option<B256> {
        self.levels.last().and_then(|level| level.first().copied())
    }

    /// Check whether the tree root equals `expected`.
    ///
    /// An empty tree matches nothing, not even an empty or zero claim, so an
    /// empty roster is rejected as a root mismatch before any quorum check.
    pub fn matches(&self, expected: &B256) -> bool {
        self.root().as_ref() == Some(expected)
    }

    /// Number of real (unpadded) leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Number of leaves after zero padding (a power of two, or 0).
    pub fn padded_leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Number of hashing levels above the leaves (`log2` of the padded count).
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Nodes at `level`, where 0 is the padded leaf level.
    pub fn level(&self, level: usize) -> Option<&[B256]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    /// Check if the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }
}
