//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Two index-aligned per-operator sequences have different lengths.
    #[error("Length mismatch: {field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending sequence.
        field: &'static str,
        /// Length of the roster the sequence must align with.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An aggregation bit was neither 0 nor 1.
    #[error("Invalid aggregation bit at index {index}: {value} (must be 0 or 1)")]
    InvalidAggregationBit {
        /// Position in the bit vector.
        index: usize,
        /// Offending value.
        value: u8,
    },
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
