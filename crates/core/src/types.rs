//! Core types for committee state proofs.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::hashing::compute_leaf_hash;
use crate::record::StateProofRecord;

/// An L2 block committed to by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct L2Block {
    /// L2 block number.
    pub block_number: u64,
    /// L2 block hash.
    pub block_hash: B256,
}

/// Header of a batch of L2 blocks settled on L1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    /// Sequential batch number within the chain.
    pub batch_number: u64,
    /// Chain the batch belongs to.
    pub chain_id: u32,
    /// L1 block containing the batch submission.
    pub l1_block_number: u64,
    /// L1 transaction carrying the batch.
    pub l1_tx_hash: B256,
    /// Index of that transaction within the L1 block.
    pub l1_tx_index: u32,
    /// Ordered L2 blocks covered by the batch.
    #[serde(default)]
    pub l2_blocks: Vec<L2Block>,
}

/// Committee commitment attached to every batch.
///
/// `total_voting_power` must equal the sum of voting powers of the roster
/// that produced `current_committee_root`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitteeHeader {
    /// Root of the committee that attested this batch.
    #[serde(rename = "current_committee", alias = "current_committee_root")]
    pub current_committee_root: B256,
    /// Root of the committee expected to attest the following batch.
    #[serde(rename = "next_committee", alias = "next_committee_root")]
    pub next_committee_root: B256,
    /// Declared total voting power of the current committee.
    pub total_voting_power: u64,
}

/// One entry of an ordered operator roster.
///
/// Roster order is leaf order of the committee tree and the order of the
/// aggregation bit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    /// Operator (stake) address.
    pub address: Address,
    /// Raw BLS public key bytes, exactly as committed in the leaf.
    pub bls_public_key: Bytes,
    /// Voting power of the operator.
    pub voting_power: u64,
}

impl Operator {
    /// Create a roster entry.
    pub fn new(address: Address, bls_public_key: impl Into<Bytes>, voting_power: u64) -> Self {
        Self {
            address,
            bls_public_key: bls_public_key.into(),
            voting_power,
        }
    }

    /// Committee tree leaf for this operator.
    pub fn leaf_hash(&self) -> B256 {
        compute_leaf_hash(&self.address, &self.bls_public_key, self.voting_power)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (power {})", self.address, self.voting_power)
    }
}

/// An operator that contributed a signature share to a batch.
///
/// Store-backed sources record signers by identity rather than by bit; see
/// [`derive_aggregation_bits`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signer {
    /// Operator (stake) address.
    pub address: Address,
    /// BLS public key the share was produced with.
    pub public_key: Bytes,
}

/// Derive the aggregation bit vector for `roster` from an unordered signer list.
///
/// Operator `i` is flagged iff some signer matches both its address and its
/// public key. The result is always index-aligned with `roster`.
pub fn derive_aggregation_bits(roster: &[Operator], signers: &[Signer]) -> Vec<bool> {
    roster
        .iter()
        .map(|op| {
            signers
                .iter()
                .any(|s| s.address == op.address && s.public_key == op.bls_public_key)
        })
        .collect()
}

/// A claimed proof that a batch was attested by a committee.
///
/// The roster and the aggregation bit vector always have the same length;
/// both constructors and deserialization enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateProofRecord", into = "StateProofRecord")]
pub struct StateProof {
    roster: Vec<Operator>,
    aggregation_bits: Vec<bool>,
    aggregated_signature: Bytes,
    committee_header: CommitteeHeader,
    batch_header: BatchHeader,
}

impl StateProof {
    /// Assemble a proof, checking that the bit vector aligns with the roster.
    pub fn new(
        roster: Vec<Operator>,
        aggregation_bits: Vec<bool>,
        aggregated_signature: impl Into<Bytes>,
        committee_header: CommitteeHeader,
        batch_header: BatchHeader,
    ) -> Result<Self> {
        if aggregation_bits.len() != roster.len() {
            return Err(CoreError::LengthMismatch {
                field: "aggregation_bits",
                expected: roster.len(),
                actual: aggregation_bits.len(),
            });
        }

        Ok(Self {
            roster,
            aggregation_bits,
            aggregated_signature: aggregated_signature.into(),
            committee_header,
            batch_header,
        })
    }

    /// Ordered operator roster.
    pub fn roster(&self) -> &[Operator] {
        &self.roster
    }

    /// Mutable access to roster entries. The roster length cannot change.
    pub fn roster_mut(&mut self) -> &mut [Operator] {
        &mut self.roster
    }

    /// Aggregation bits, index-aligned with the roster.
    pub fn aggregation_bits(&self) -> &[bool] {
        &self.aggregation_bits
    }

    /// Mutable access to the aggregation bits. The length cannot change.
    pub fn aggregation_bits_mut(&mut self) -> &mut [bool] {
        &mut self.aggregation_bits
    }

    /// Aggregated BLS signature bytes.
    pub fn aggregated_signature(&self) -> &[u8] {
        &self.aggregated_signature
    }

    /// Committee header.
    pub fn committee_header(&self) -> &CommitteeHeader {
        &self.committee_header
    }

    /// Batch header.
    pub fn batch_header(&self) -> &BatchHeader {
        &self.batch_header
    }

    /// Chain the proven batch belongs to.
    pub fn chain_id(&self) -> u32 {
        self.batch_header.chain_id
    }

    /// Number of the proven batch.
    pub fn batch_number(&self) -> u64 {
        self.batch_header.batch_number
    }

    /// Voting powers in roster order.
    pub fn voting_powers(&self) -> Vec<u64> {
        self.roster.iter().map(|op| op.voting_power).collect()
    }

    /// Public keys in roster order.
    pub fn public_keys(&self) -> Vec<&[u8]> {
        self.roster
            .iter()
            .map(|op| op.bls_public_key.as_ref())
            .collect()
    }

    /// Number of operators flagged as signers.
    pub fn signer_count(&self) -> usize {
        self.aggregation_bits.iter().filter(|b| **b).count()
    }

    /// Decompose into owned parts.
    pub fn into_parts(self) -> (Vec<Operator>, Vec<bool>, Bytes, CommitteeHeader, BatchHeader) {
        (
            self.roster,
            self.aggregation_bits,
            self.aggregated_signature,
            self.committee_header,
            self.batch_header,
        )
    }
}
