//! Quorum checking.
//!
//! Sums are computed in `u128` so neither the roster total nor the `* 3`
//! and `* 2` products can overflow for any realistic roster.

use lsc_core::{QUORUM_DENOMINATOR, QUORUM_NUMERATOR};
use thiserror::Error;

/// Reasons a roster fails the quorum check.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumError {
    /// Roster powers do not add up to the declared committee total.
    #[error("Total voting power mismatch: roster sums to {computed}, header declares {declared}")]
    TotalMismatch {
        /// Sum over the supplied roster.
        computed: u128,
        /// `total_voting_power` from the committee header.
        declared: u64,
    },

    /// Signed power is not strictly above two thirds of the total.
    #[error("Insufficient voting power: {signed} of {total} signed (need > 2/3)")]
    InsufficientPower {
        /// Power of operators flagged in the bit vector.
        signed: u128,
        /// Total roster power.
        total: u128,
    },

    /// Power list and bit vector are not index-aligned.
    #[error("Quorum inputs misaligned: {powers} voting powers, {bits} aggregation bits")]
    LengthMismatch {
        /// Number of voting powers.
        powers: usize,
        /// Number of aggregation bits.
        bits: usize,
    },
}

/// Voting power tally of a passing quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumTally {
    /// Power of the signing operators.
    pub signed: u128,
    /// Power of the whole roster.
    pub total: u128,
}

/// Check that the flagged operators hold strictly more than 2/3 of the power.
///
/// The roster total must equal `declared_total` first; a mismatch is
/// reported regardless of how much power signed.
pub fn check_quorum(
    voting_powers: &[u64],
    aggregation_bits: &[bool],
    declared_total: u64,
) -> Result<QuorumTally, QuorumError> {
    if voting_powers.len() != aggregation_bits.len() {
        return Err(QuorumError::LengthMismatch {
            powers: voting_powers.len(),
            bits: aggregation_bits.len(),
        });
    }

    let total: u128 = voting_powers.iter().map(|&p| u128::from(p)).sum();
    if total != u128::from(declared_total) {
        return Err(QuorumError::TotalMismatch {
            computed: total,
            declared: declared_total,
        });
    }

    let signed: u128 = voting_powers
        .iter()
        .zip(aggregation_bits)
        .filter(|&(_, &bit)| bit)
        .map(|(&p, _)| u128::from(p))
        .sum();

    if signed * QUORUM_DENOMINATOR <= total * QUORUM_NUMERATOR {
        return Err(QuorumError::InsufficientPower { signed, total });
    }

    Ok(QuorumTally { signed, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_two_thirds_fails() {
        let err = check_quorum(&[100, 100, 100], &[true, true, false], 300).unwrap_err();
        assert_eq!(
            err,
            QuorumError::InsufficientPower {
                signed: 200,
                total: 300
            }
        );
    }

    #[test]
    fn test_just_above_two_thirds_passes() {
        let tally = check_quorum(&[101, 100, 99], &[true, true, false], 300).unwrap();
        assert_eq!(tally, QuorumTally { signed: 201, total: 300 });
    }

    #[test]
    fn test_total_mismatch_reported_regardless_of_signed() {
        let err = check_quorum(&[100, 100, 100], &[true, true, true], 301).unwrap_err();
        assert_eq!(
            err,
            QuorumError::TotalMismatch {
                computed: 300,
                declared: 301
            }
        );

        let err = check_quorum(&[100, 100, 100], &[false, false, false], 299).unwrap_err();
        assert!(matches!(err, QuorumError::TotalMismatch { .. }));
    }

    #[test]
    fn test_no_overflow_at_max_power() {
        // Three u64::MAX operators overflow a u64 sum; the declared total
        // cannot match, which must surface as a mismatch rather than a panic.
        let powers = [u64::MAX, u64::MAX, u64::MAX];
        let err = check_quorum(&powers, &[true, true, true], u64::MAX).unwrap_err();
        assert_eq!(
            err,
            QuorumError::TotalMismatch {
                computed: 3 * u128::from(u64::MAX),
                declared: u64::MAX
            }
        );

        let tally = check_quorum(&[u64::MAX], &[true], u64::MAX).unwrap();
        assert_eq!(tally.signed, u128::from(u64::MAX));
    }

    #[test]
    fn test_empty_roster_never_reaches_quorum() {
        let err = check_quorum(&[], &[], 0).unwrap_err();
        assert_eq!(err, QuorumError::InsufficientPower { signed: 0, total: 0 });
    }

    #[test]
    fn test_misaligned_inputs() {
        let err = check_quorum(&[1, 2], &[true], 3).unwrap_err();
        assert_eq!(err, QuorumError::LengthMismatch { powers: 2, bits: 1 });
    }
}
