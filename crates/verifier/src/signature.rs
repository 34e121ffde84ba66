//! Aggregate signature verification.
//!
//! This module selects the signing subset of a roster and hands it to an
//! [`AggregateVerifier`]. Curve arithmetic lives behind that trait.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named BLS pairing curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlsCurve {
    /// BN254 (alt_bn128).
    #[default]
    #[serde(rename = "bn254")]
    Bn254,
    /// BLS12-381.
    #[serde(rename = "bls12_381")]
    Bls12_381,
}

impl BlsCurve {
    /// Configuration name of the curve.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlsCurve::Bn254 => "bn254",
            BlsCurve::Bls12_381 => "bls12_381",
        }
    }
}

impl fmt::Display for BlsCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlsCurve {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bn254" | "bn256" | "alt_bn128" => Ok(BlsCurve::Bn254),
            "bls12_381" | "bls12-381" => Ok(BlsCurve::Bls12_381),
            _ => Err(SignatureError::UnknownCurve(s.to_string())),
        }
    }
}

/// Failures of the signature capability.
///
/// None of these mean "the system is broken"; the orchestrator reports all of
/// them as an invalid signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The verifier has no implementation for this curve.
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(BlsCurve),

    /// Curve name not recognised.
    #[error("Unknown curve: {0}")]
    UnknownCurve(String),

    /// A public key or signature is not a valid encoded point.
    #[error("Failed to decode {what}: {reason}")]
    Decode {
        /// Which input failed ("public key 3", "signature").
        what: String,
        /// Decoder message.
        reason: String,
    },

    /// The message could not be mapped to a curve point.
    #[error("Hash to curve failed after {0} attempts")]
    HashToCurve(usize),

    /// Public keys and aggregation bits are not index-aligned.
    #[error("Signer selection misaligned: {keys} public keys, {bits} aggregation bits")]
    LengthMismatch {
        /// Number of public keys.
        keys: usize,
        /// Number of aggregation bits.
        bits: usize,
    },
}

/// External BLS aggregate verification capability.
///
/// Implementations aggregate `public_keys` and check `signature` over
/// `message` on `curve`. `Ok(false)` is a legitimate negative outcome.
pub trait AggregateVerifier {
    /// Verify an aggregate signature against the given signer keys.
    fn verify_aggregate(
        &self,
        curve: BlsCurve,
        public_keys: &[&[u8]],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SignatureError>;
}

impl<V: AggregateVerifier + ?Sized> AggregateVerifier for &V {
    fn verify_aggregate(
        &self,
        curve: BlsCurve,
        public_keys: &[&[u8]],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SignatureError> {
        (**self).verify_aggregate(curve, public_keys, message, signature)
    }
}

/// Keep the keys whose aggregation bit is set, in roster order.
pub fn select_signers<'a>(
    public_keys: &[&'a [u8]],
    aggregation_bits: &[bool],
) -> Result<Vec<&'a [u8]>, SignatureError> {
    if public_keys.len() != aggregation_bits.len() {
        return Err(SignatureError::LengthMismatch {
            keys: public_keys.len(),
            bits: aggregation_bits.len(),
        });
    }

    Ok(public_keys
        .iter()
        .zip(aggregation_bits)
        .filter(|&(_, &bit)| bit)
        .map(|(&key, _)| key)
        .collect())
}

/// Verify `signature` over `message` against the bit-selected signers.
pub fn verify_aggregate<V>(
    verifier: &V,
    public_keys: &[&[u8]],
    aggregation_bits: &[bool],
    message: &[u8],
    signature: &[u8],
    curve: BlsCurve,
) -> Result<bool, SignatureError>
where
    V: AggregateVerifier + ?Sized,
{
    let signers = select_signers(public_keys, aggregation_bits)?;
    verifier.verify_aggregate(curve, &signers, message, signature)
}
