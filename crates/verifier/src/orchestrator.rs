//! Per-batch proof verification.

use std::fmt;

use alloy_primitives::B256;
use lsc_core::{BatchDigest, CommitteeHeader, KeccakBatchDigest, StateProof};
use lsc_merkle::committee_root;

use crate::bn254::Bn254Verifier;
use crate::continuity::{check_continuity, ContinuityError};
use crate::message::canonical_message;
use crate::quorum::{check_quorum, QuorumError};
use crate::signature::{verify_aggregate, AggregateVerifier, BlsCurve};

/// Outcome of verifying one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every check passed.
    Verified,
    /// The roster does not hash to the claimed committee root.
    RootMismatch {
        /// `current_committee_root` from the committee header.
        claimed: B256,
        /// Root rebuilt from the roster (`None` for an empty roster).
        computed: Option<B256>,
    },
    /// Batch is not attested by the committee its predecessor announced.
    ContinuityBroken(ContinuityError),
    /// Declared total is inconsistent or signed power is at most 2/3.
    QuorumFailed(QuorumError),
    /// The aggregate signature does not verify; carries the capability's
    /// error when there was one.
    SignatureInvalid(Option<String>),
    /// The proof is not available yet. Only produced by the chain driver.
    TransientUnavailable,
}

impl Verdict {
    /// True for the four durable verification failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Verdict::RootMismatch { .. }
                | Verdict::ContinuityBroken(_)
                | Verdict::QuorumFailed(_)
                | Verdict::SignatureInvalid(_)
        )
    }

    /// Short stable name, used as the failure ledger reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::RootMismatch { .. } => "root_mismatch",
            Verdict::ContinuityBroken(_) => "continuity_broken",
            Verdict::QuorumFailed(_) => "quorum_failed",
            Verdict::SignatureInvalid(_) => "signature_invalid",
            Verdict::TransientUnavailable => "transient_unavailable",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Verified => write!(f, "verified"),
            Verdict::RootMismatch { claimed, computed } => match computed {
                Some(root) => write!(f, "root mismatch: claimed {claimed}, roster gives {root}"),
                None => write!(f, "root mismatch: claimed {claimed}, roster is empty"),
            },
            Verdict::ContinuityBroken(e) => write!(f, "{e}"),
            Verdict::QuorumFailed(e) => write!(f, "{e}"),
            Verdict::SignatureInvalid(Some(reason)) => write!(f, "signature invalid: {reason}"),
            Verdict::SignatureInvalid(None) => write!(f, "signature invalid"),
            Verdict::TransientUnavailable => write!(f, "not available yet"),
        }
    }
}

/// Verifies state proofs in a fixed order, stopping at the first failure:
///
/// 1. committee root rebuilt from the roster
/// 2. continuity with the previous batch
/// 3. quorum
/// 4. aggregate signature over the canonical message
///
/// Performs no I/O and never logs.
#[derive(Debug, Clone)]
pub struct ProofVerifier<V, D = KeccakBatchDigest> {
    signatures: V,
    digest: D,
    curve: BlsCurve,
}

impl ProofVerifier<Bn254Verifier> {
    /// BN254 verifier with the default batch digest.
    pub fn bn254() -> Self {
        Self::new(Bn254Verifier, BlsCurve::Bn254)
    }
}

impl<V: AggregateVerifier> ProofVerifier<V> {
    /// Verifier using `signatures` on `curve` with the default batch digest.
    pub fn new(signatures: V, curve: BlsCurve) -> Self {
        Self::with_digest(signatures, KeccakBatchDigest, curve)
    }
}

impl<V: AggregateVerifier, D: BatchDigest> ProofVerifier<V, D> {
    /// Verifier with a custom batch header digest.
    pub fn with_digest(signatures: V, digest: D, curve: BlsCurve) -> Self {
        Self {
            signatures,
            digest,
            curve,
        }
    }

    /// Curve passed to the signature capability.
    pub fn curve(&self) -> BlsCurve {
        self.curve
    }

    /// Verify one batch proof.
    ///
    /// `previous` is the committee header of the batch before this one, if
    /// known. An empty roster never matches a claimed root, so it is rejected
    /// as a root mismatch rather than as a quorum failure.
    pub fn verify(&self, proof: &StateProof, previous: Option<&CommitteeHeader>) -> Verdict {
        let header = proof.committee_header();

        let computed = committee_root(proof.roster());
        if computed != Some(header.current_committee_root) {
            return Verdict::RootMismatch {
                claimed: header.current_committee_root,
                computed,
            };
        }

        if let Err(e) = check_continuity(previous, header) {
            return Verdict::ContinuityBroken(e);
        }

        if let Err(e) = check_quorum(
            &proof.voting_powers(),
            proof.aggregation_bits(),
            header.total_voting_power,
        ) {
            return Verdict::QuorumFailed(e);
        }

        let message = canonical_message(&self.digest, proof.batch_header(), header);
        match verify_aggregate(
            &self.signatures,
            &proof.public_keys(),
            proof.aggregation_bits(),
            message.as_slice(),
            proof.aggregated_signature(),
            self.curve,
        ) {
            Ok(true) => Verdict::Verified,
            Ok(false) => Verdict::SignatureInvalid(None),
            Err(e) => Verdict::SignatureInvalid(Some(e.to_string())),
        }
    }
}
