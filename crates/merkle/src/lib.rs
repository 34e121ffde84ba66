//! Committee Merkle tree for state proof verification.
//!
//! This crate provides:
//! - [`CommitteeTreeBuilder`] collecting leaves in roster order
//! - [`CommitteeTree`] holding every level of the padded binary tree
//! - [`committee_root`] / [`root_hash`] shortcuts for root derivation
//!
//! Leaves are never sorted; roster order is part of the commitment. There is
//! no inclusion-proof support because verifiers always hold the full roster.

#![warn(missing_docs)]

pub mod builder;
pub mod tree;

pub use builder::CommitteeTreeBuilder;
pub use tree::CommitteeTree;

use alloy_primitives::B256;
use lsc_core::Operator;

/// Root over already-hashed leaves, or `None` for an empty leaf set.
pub fn root_hash(leaves: &[B256]) -> Option<B256> {
    let mut builder = CommitteeTreeBuilder::new();
    builder.extend_leaves(leaves.iter().copied());
    builder.build().root()
}

/// Root of the committee formed by `roster`, or `None` for an empty roster.
pub fn committee_root(roster: &[Operator]) -> Option<B256> {
    CommitteeTreeBuilder::from_roster(roster).build().root()
}
