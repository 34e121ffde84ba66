//! Committee continuity between consecutive batches.

use alloy_primitives::B256;
use lsc_core::CommitteeHeader;
use thiserror::Error;

/// A batch was attested by a committee other than the one announced by its
/// predecessor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityError {
    /// `previous.next_committee_root != current.current_committee_root`.
    #[error("Committee continuity broken: previous batch announced {expected}, batch is attested by {found}")]
    Broken {
        /// Next committee announced by the previous batch.
        expected: B256,
        /// Current committee of this batch.
        found: B256,
    },
}

/// Check that `current` continues the committee chain of `previous`.
///
/// Holds trivially when there is no previous batch.
pub fn check_continuity(
    previous: Option<&CommitteeHeader>,
    current: &CommitteeHeader,
) -> Result<(), ContinuityError> {
    match previous {
        Some(prev) if prev.next_committee_root != current.current_committee_root => {
            Err(ContinuityError::Broken {
                expected: prev.next_committee_root,
                found: current.current_committee_root,
            })
        }
        _ => Ok(()),
    }
}
