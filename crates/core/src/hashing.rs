//! Hashing utilities for committee roots and batch digests.
//!
//! Every hash in the protocol is Keccak-256 (not SHA3-256). Encodings are
//! byte-exact; any change here is a protocol-breaking change.

use alloy_primitives::{keccak256 as alloy_keccak256, Address, B256};

use crate::constants::{COMMITTEE_INNER_PREFIX, COMMITTEE_LEAF_PREFIX, VOTING_POWER_WIDTH};
use crate::types::BatchHeader;

/// Compute keccak256 hash of input data.
pub fn keccak256(data: &[u8]) -> B256 {
    alloy_keccak256(data)
}

/// Compute the committee leaf hash for one operator.
///
/// The leaf is `keccak256(0x01 || public_key || address || voting_power)`
/// where `voting_power` is big-endian, left-padded to 12 bytes. The public
/// key is hashed as raw bytes of whatever length the roster carries.
///
/// # Example
///
/// ```
/// use lsc_core::hashing::compute_leaf_hash;
/// use alloy_primitives::Address;
///
/// let leaf = compute_leaf_hash(&Address::from([0x11; 20]), &[0xaa; 48], 1_000_000);
/// ```
pub fn compute_leaf_hash(address: &Address, public_key: &[u8], voting_power: u64) -> B256 {
    let mut data = Vec::with_capacity(1 + public_key.len() + 20 + VOTING_POWER_WIDTH);
    data.push(COMMITTEE_LEAF_PREFIX);
    data.extend_from_slice(public_key);
    data.extend_from_slice(address.as_slice());
    data.extend_from_slice(&encode_voting_power(voting_power));

    keccak256(&data)
}

/// Compute an inner committee node: `keccak256(0x02 || left || right)`.
///
/// Positional; children are never sorted.
pub fn compute_inner_hash(left: &B256, right: &B256) -> B256 {
    let mut data = Vec::with_capacity(65);
    data.push(COMMITTEE_INNER_PREFIX);
    data.extend_from_slice(left.as_ref());
    data.extend_from_slice(right.as_ref());

    keccak256(&data)
}

/// Voting power as a 12-byte big-endian integer.
fn encode_voting_power(voting_power: u64) -> [u8; VOTING_POWER_WIDTH] {
    let mut out = [0u8; VOTING_POWER_WIDTH];
    out[VOTING_POWER_WIDTH - 8..].copy_from_slice(&voting_power.to_be_bytes());
    out
}

/// Deterministic digest of a batch header.
///
/// The digest is an input to the canonical signed message. Deployments whose
/// producers use a different header encoding plug theirs in here.
pub trait BatchDigest {
    /// Hash a batch header to 32 bytes.
    fn digest(&self, header: &BatchHeader) -> B256;
}

impl<F> BatchDigest for F
where
    F: Fn(&BatchHeader) -> B256,
{
    fn digest(&self, header: &BatchHeader) -> B256 {
        self(header)
    }
}

/// Default batch header digest.
///
/// `keccak256(batch_number || chain_id || l1_block_number || l1_tx_hash ||
/// l1_tx_index || (block_number || block_hash)*)`, integers big-endian at
/// their native width.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeccakBatchDigest;

impl BatchDigest for KeccakBatchDigest {
    fn digest(&self, header: &BatchHeader) -> B256 {
        let mut data = Vec::with_capacity(56 + header.l2_blocks.len() * 40);
        data.extend_from_slice(&header.batch_number.to_be_bytes());
        data.extend_from_slice(&header.chain_id.to_be_bytes());
        data.extend_from_slice(&header.l1_block_number.to_be_bytes());
        data.extend_from_slice(header.l1_tx_hash.as_slice());
        data.extend_from_slice(&header.l1_tx_index.to_be_bytes());
        for block in &header.l2_blocks {
            data.extend_from_slice(&block.block_number.to_be_bytes());
            data.extend_from_slice(block.block_hash.as_slice());
        }

        keccak256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::L2Block;
    use alloy_primitives::hex;

    fn batch() -> BatchHeader {
        BatchHeader {
            batch_number: 1,
            chain_id: 2,
            l1_block_number: 3,
            l1_tx_hash: B256::repeat_byte(0x44),
            l1_tx_index: 5,
            l2_blocks: vec![L2Block {
                block_number: 6,
                block_hash: B256::repeat_byte(0x77),
            }],
        }
    }

    #[test]
    fn test_keccak256() {
        // Keccak-256, not SHA3-256
        let expected = B256::from(hex!(
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        ));
        assert_eq!(keccak256(b""), expected);

        let expected = B256::from(hex!(
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        ));
        assert_eq!(keccak256(b"abc"), expected);
    }

    #[test]
    fn test_compute_leaf_hash_preimage() {
        let address = Address::from(hex!("6E654b122377EA7f592bf3FD5bcdE9e8c1B1cEb9"));
        let public_key = [0xab; 48];
        let voting_power = 1_000_000u64; // 0x0f4240

        let mut expected_preimage = vec![COMMITTEE_LEAF_PREFIX];
        expected_preimage.extend_from_slice(&public_key);
        expected_preimage.extend_from_slice(address.as_slice());
        expected_preimage.extend_from_slice(&hex!("0000000000000000000f4240"));
        assert_eq!(expected_preimage.len(), 1 + 48 + 20 + 12);

        assert_eq!(
            compute_leaf_hash(&address, &public_key, voting_power),
            keccak256(&expected_preimage)
        );
    }

    #[test]
    fn test_leaf_hash_max_power_is_padded() {
        assert_eq!(
            encode_voting_power(u64::MAX),
            hex!("00000000ffffffffffffffff")
        );
        assert_eq!(encode_voting_power(0), [0u8; 12]);
    }

    #[test]
    fn test_compute_inner_hash() {
        let left = B256::repeat_byte(0xaa);
        let right = B256::repeat_byte(0xbb);

        let mut expected_preimage = vec![COMMITTEE_INNER_PREFIX];
        expected_preimage.extend_from_slice(left.as_ref());
        expected_preimage.extend_from_slice(right.as_ref());

        assert_eq!(compute_inner_hash(&left, &right), keccak256(&expected_preimage));

        // Positional: swapping children changes the node.
        assert_ne!(
            compute_inner_hash(&left, &right),
            compute_inner_hash(&right, &left)
        );
    }

    #[test]
    fn test_leaf_and_inner_domains_differ() {
        // A public key shaped like two child hashes still hashes under the leaf tag.
        let left = B256::repeat_byte(0x01);
        let right = B256::repeat_byte(0x02);
        let mut fake_key = Vec::new();
        fake_key.extend_from_slice(left.as_slice());
        fake_key.extend_from_slice(right.as_slice());

        assert_ne!(
            compute_leaf_hash(&Address::ZERO, &fake_key, 0),
            compute_inner_hash(&left, &right)
        );
    }

    #[test]
    fn test_keccak_batch_digest_preimage() {
        let header = batch();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(&3u64.to_be_bytes());
        expected.extend_from_slice(&[0x44; 32]);
        expected.extend_from_slice(&5u32.to_be_bytes());
        expected.extend_from_slice(&6u64.to_be_bytes());
        expected.extend_from_slice(&[0x77; 32]);

        assert_eq!(KeccakBatchDigest.digest(&header), keccak256(&expected));
    }

    #[test]
    fn test_batch_digest_covers_l2_blocks() {
        let header = batch();
        let mut extended = header.clone();
        extended.l2_blocks.push(L2Block {
            block_number: 7,
            block_hash: B256::ZERO,
        });
        assert_ne!(
            KeccakBatchDigest.digest(&header),
            KeccakBatchDigest.digest(&extended)
        );
    }

    #[test]
    fn test_closure_batch_digest() {
        let fixed = |_: &BatchHeader| B256::repeat_byte(0x99);
        assert_eq!(fixed.digest(&batch()), B256::repeat_byte(0x99));
    }
}
