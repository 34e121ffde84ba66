//! Canonical signed message.

use alloy_primitives::B256;
use lsc_core::{keccak256, BatchDigest, BatchHeader, CommitteeHeader};

/// Length of the canonical message preimage.
pub const CANONICAL_PREIMAGE_LEN: usize = 32 + 32 + 32 + 8;

/// Compute the message the committee's aggregate signature must cover.
///
/// `keccak256(digest(batch) || current_committee_root || next_committee_root
/// || total_voting_power)`, with the power as 8 bytes big-endian. Field order
/// is part of the protocol.
pub fn canonical_message<D>(digest: &D, batch: &BatchHeader, committee: &CommitteeHeader) -> B256
where
    D: BatchDigest + ?Sized,
{
    let mut data = Vec::with_capacity(CANONICAL_PREIMAGE_LEN);
    data.extend_from_slice(digest.digest(batch).as_slice());
    data.extend_from_slice(committee.current_committee_root.as_slice());
    data.extend_from_slice(committee.next_committee_root.as_slice());
    data.extend_from_slice(&committee.total_voting_power.to_be_bytes());

    keccak256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsc_core::KeccakBatchDigest;

    fn batch() -> BatchHeader {
        BatchHeader {
            batch_number: 32840,
            chain_id: 421614,
            l1_block_number: 5555,
            l1_tx_hash: B256::repeat_byte(0x95),
            l1_tx_index: 3,
            l2_blocks: vec![],
        }
    }

    fn committee() -> CommitteeHeader {
        CommitteeHeader {
            current_committee_root: B256::repeat_byte(0x11),
            next_committee_root: B256::repeat_byte(0x22),
            total_voting_power: 3_000_000,
        }
    }

    #[test]
    fn test_preimage_layout() {
        let fixed = |_: &BatchHeader| B256::repeat_byte(0xdd);

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0xdd; 32]);
        expected.extend_from_slice(&[0x11; 32]);
        expected.extend_from_slice(&[0x22; 32]);
        expected.extend_from_slice(&3_000_000u64.to_be_bytes());
        assert_eq!(expected.len(), CANONICAL_PREIMAGE_LEN);

        assert_eq!(
            canonical_message(&fixed, &batch(), &committee()),
            keccak256(&expected)
        );
    }

    #[test]
    fn test_swapping_committee_roots_changes_message() {
        let header = committee();
        let swapped = CommitteeHeader {
            current_committee_root: header.next_committee_root,
            next_committee_root: header.current_committee_root,
            ..header
        };

        assert_ne!(
            canonical_message(&KeccakBatchDigest, &batch(), &header),
            canonical_message(&KeccakBatchDigest, &batch(), &swapped)
        );
    }

    #[test]
    fn test_every_field_is_covered() {
        let base = canonical_message(&KeccakBatchDigest, &batch(), &committee());

        let mut other_batch = batch();
        other_batch.batch_number += 1;
        assert_ne!(
            base,
            canonical_message(&KeccakBatchDigest, &other_batch, &committee())
        );

        let mut other_power = committee();
        other_power.total_voting_power -= 1;
        assert_ne!(
            base,
            canonical_message(&KeccakBatchDigest, &batch(), &other_power)
        );
    }
}
