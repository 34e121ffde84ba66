//! # LSC Core
//!
//! Core types, constants and hashing for verifying committee-attested batch
//! state proofs.
//!
//! ## Features
//!
//! - **Ethereum Types**: Uses Alloy primitives for Address, B256, Bytes and keccak256
//! - **Domain Types**: Operator, CommitteeHeader, BatchHeader, StateProof
//! - **Wire Records**: JSON record shape with index-alignment enforced on decode
//! - **Hashing**: committee leaf/inner encodings and the batch header digest

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod hashing;
pub mod record;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use error::{CoreError, Result};
pub use hashing::{keccak256, BatchDigest, KeccakBatchDigest};
pub use record::StateProofRecord;
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, Bytes, B256};
