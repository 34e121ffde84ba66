//! Builder for committee trees.

use alloy_primitives::B256;
use lsc_core::Operator;

use crate::tree::CommitteeTree;

/// Builder for a committee tree.
///
/// Leaves are kept in insertion order, which must be roster order.
///
/// # Examples
///
/// ```
/// use lsc_merkle::CommitteeTreeBuilder;
/// use alloy_primitives::B256;
///
/// let mut builder = CommitteeTreeBuilder::new();
/// builder.push_leaf(B256::from([0x01; 32]));
/// builder.push_leaf(B256::from([0x02; 32]));
/// let tree = builder.build();
/// assert!(tree.root().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommitteeTreeBuilder {
    leaves: Vec<B256>,
}

impl CommitteeTreeBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    /// Builder pre-filled with the leaf of every operator, in roster order.
    pub fn from_roster(roster: &[Operator]) -> Self {
        let mut builder = Self {
            leaves: Vec::with_capacity(roster.len()),
        };
        for operator in roster {
            builder.push_operator(operator);
        }
        builder
    }

    /// Append the leaf of one operator.
    pub fn push_operator(&mut self, operator: &Operator) -> &mut Self {
        self.push_leaf(operator.leaf_hash())
    }

    /// Append an already-hashed leaf.
    pub fn push_leaf(&mut self, leaf: B256) -> &mut Self {
        self.leaves.push(leaf);
        self
    }

    /// Append several already-hashed leaves.
    pub fn extend_leaves(&mut self, leaves: impl IntoIterator<Item = B256>) -> &mut Self {
        self.leaves.extend(leaves);
        self
    }

    /// Get the number of leaves collected so far.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the builder is empty (no leaves).
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Build the tree.
    ///
    /// Leaves are right-padded with zero leaves up to the next power of two,
    /// then adjacent pairs are hashed level by level until one node remains.
    pub fn build(self) -> CommitteeTree {
        let leaf_count = self.leaves.len();
        if leaf_count == 0 {
            return CommitteeTree::empty();
        }

        let mut level = self.leaves;
        level.resize(leaf_count.next_power_of_two(), B256::ZERO);

        let mut levels = vec![level];
        while levels[levels.len() - 1].len() > 1 {
            let next = levels[levels.len() - 1]
                .chunks_exact(2)
                .map(|pair| lsc_core::hashing::compute_inner_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }

        CommitteeTree::from_levels(leaf_count, levels)
    }
}
