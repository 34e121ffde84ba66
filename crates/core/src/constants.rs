//! Canonical constants for the committee attestation protocol.
//!
//! These values are part of the signed wire format. Changing any of them
//! changes every committee root and every canonical message.

/// Domain tag prepended to a committee leaf before hashing.
pub const COMMITTEE_LEAF_PREFIX: u8 = 0x01;

/// Domain tag prepended to an inner committee node before hashing.
///
/// Distinct from [`COMMITTEE_LEAF_PREFIX`] so a leaf preimage can never be
/// reinterpreted as an inner node.
pub const COMMITTEE_INNER_PREFIX: u8 = 0x02;

/// Width in bytes of the big-endian voting power inside a leaf preimage.
pub const VOTING_POWER_WIDTH: usize = 12;

/// Quorum threshold numerator: signed power must be strictly greater than
/// `QUORUM_NUMERATOR / QUORUM_DENOMINATOR` of the total.
pub const QUORUM_NUMERATOR: u128 = 2;

/// Quorum threshold denominator.
pub const QUORUM_DENOMINATOR: u128 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_distinct() {
        assert_ne!(COMMITTEE_LEAF_PREFIX, COMMITTEE_INNER_PREFIX);
        assert_eq!(COMMITTEE_LEAF_PREFIX, 0x01);
        assert_eq!(COMMITTEE_INNER_PREFIX, 0x02);
    }

    #[test]
    fn test_voting_power_fits_in_leaf_width() {
        // A u64 must fit into the padded field without truncation.
        assert!(VOTING_POWER_WIDTH >= std::mem::size_of::<u64>());
    }
}
