//! Offline verifier for committee-attested batch state proofs.
//!
//! Verifies, for one batch:
//! - the committee root rebuilt from the roster
//! - continuity with the previous batch's announced next committee
//! - a strict > 2/3 voting power quorum
//! - the BLS aggregate signature over the canonical message
//!
//! Everything here is pure: no I/O, no logging, no clocks. Callers own
//! retries and persistence.

#![warn(missing_docs)]

pub mod bn254;
pub mod continuity;
pub mod message;
pub mod orchestrator;
pub mod quorum;
pub mod signature;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use bn254::Bn254Verifier;
pub use continuity::{check_continuity, ContinuityError};
pub use message::canonical_message;
pub use orchestrator::{ProofVerifier, Verdict};
pub use quorum::{check_quorum, QuorumError, QuorumTally};
pub use signature::{select_signers, verify_aggregate, AggregateVerifier, BlsCurve, SignatureError};
