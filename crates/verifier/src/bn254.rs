//! BLS aggregate verification over BN254.
//!
//! Public keys live in G1 and signatures in G2. A signature over `m` by
//! secret `sk` is `sk * H(m)` where `H` hashes to G2 by try-and-increment.
//! Aggregation is point addition in both groups, so an aggregate verifies iff
//! `e(apk, H(m)) == e(g1, sig)`.
//!
//! `H` is a local try-and-increment construction keyed by
//! [`HASH_TO_G2_DOMAIN`], so this verifier accepts signatures produced the
//! same way (as the test signer does). A committee that signs with a
//! different hash-to-curve needs its own [`AggregateVerifier`] handed to
//! [`ProofVerifier`](crate::ProofVerifier).

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G1Projective, G2Affine};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{One, PrimeField, Zero};
use ark_serialize::CanonicalDeserialize;
use lsc_core::keccak256;

use crate::signature::{AggregateVerifier, BlsCurve, SignatureError};

/// Domain tag mixed into every hash-to-G2 attempt.
pub const HASH_TO_G2_DOMAIN: &[u8] = b"LSC_STATE_PROOF_BN254_G2_TAI";

/// Maximum number of try-and-increment attempts.
pub const HASH_TO_G2_MAX_ATTEMPTS: usize = 256;

const G1_COMPRESSED_LEN: usize = 32;
const G1_UNCOMPRESSED_LEN: usize = 64;
const G2_COMPRESSED_LEN: usize = 64;
const G2_UNCOMPRESSED_LEN: usize = 128;

/// [`AggregateVerifier`] for [`BlsCurve::Bn254`].
///
/// Points use arkworks canonical encoding, compressed or uncompressed,
/// distinguished by length.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bn254Verifier;

impl Bn254Verifier {
    /// Create a verifier.
    pub fn new() -> Self {
        Self
    }

    /// Whether this verifier can check signatures on `curve`.
    pub const fn supports(curve: BlsCurve) -> bool {
        matches!(curve, BlsCurve::Bn254)
    }
}

impl AggregateVerifier for Bn254Verifier {
    fn verify_aggregate(
        &self,
        curve: BlsCurve,
        public_keys: &[&[u8]],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SignatureError> {
        if !Self::supports(curve) {
            return Err(SignatureError::UnsupportedCurve(curve));
        }
        if public_keys.is_empty() {
            return Ok(false);
        }

        let mut apk = G1Projective::zero();
        for (index, bytes) in public_keys.iter().enumerate() {
            apk += decode_g1(bytes, index)?;
        }
        let apk = apk.into_affine();

        let sig = decode_g2(signature)?;
        if sig.infinity || apk.infinity {
            return Ok(false);
        }

        let h = hash_to_g2(message)?;
        let check = Bn254::multi_pairing([apk, -G1Affine::generator()], [h, sig]);
        Ok(check.0.is_one())
    }
}

/// Map `message` to a point of the G2 prime-order subgroup.
///
/// Attempt `i` derives `x = (keccak(dst || i || 0 || m), keccak(dst || i || 1 || m))`
/// reduced into Fq2, picks the y whose sign matches a bit of the first hash,
/// and clears the cofactor. The first attempt yielding a non-identity point
/// wins.
pub fn hash_to_g2(message: &[u8]) -> Result<G2Affine, SignatureError> {
    let mut preimage = Vec::with_capacity(HASH_TO_G2_DOMAIN.len() + 2 + message.len());

    for attempt in 0..HASH_TO_G2_MAX_ATTEMPTS {
        let mut coordinate = |half: u8| {
            preimage.clear();
            preimage.extend_from_slice(HASH_TO_G2_DOMAIN);
            preimage.push(attempt as u8);
            preimage.push(half);
            preimage.extend_from_slice(message);
            keccak256(&preimage)
        };
        let c0 = coordinate(0);
        let c1 = coordinate(1);

        let x = Fq2::new(
            Fq::from_be_bytes_mod_order(c0.as_slice()),
            Fq::from_be_bytes_mod_order(c1.as_slice()),
        );
        let greatest = c0[0] & 0x80 != 0;

        if let Some(point) = G2Affine::get_point_from_x_unchecked(x, greatest) {
            let point = point.clear_cofactor();
            if !point.infinity {
                return Ok(point);
            }
        }
    }

    Err(SignatureError::HashToCurve(HASH_TO_G2_MAX_ATTEMPTS))
}

fn decode_g1(bytes: &[u8], index: usize) -> Result<G1Affine, SignatureError> {
    let decoded = match bytes.len() {
        G1_COMPRESSED_LEN => G1Affine::deserialize_compressed(bytes),
        G1_UNCOMPRESSED_LEN => G1Affine::deserialize_uncompressed(bytes),
        len => {
            return Err(SignatureError::Decode {
                what: format!("public key {index}"),
                reason: format!("unexpected length {len}"),
            })
        }
    };

    decoded.map_err(|e| SignatureError::Decode {
        what: format!("public key {index}"),
        reason: e.to_string(),
    })
}

fn decode_g2(bytes: &[u8]) -> Result<G2Affine, SignatureError> {
    let decoded = match bytes.len() {
        G2_COMPRESSED_LEN => G2Affine::deserialize_compressed(bytes),
        G2_UNCOMPRESSED_LEN => G2Affine::deserialize_uncompressed(bytes),
        len => {
            return Err(SignatureError::Decode {
                what: "signature".to_string(),
                reason: format!("unexpected length {len}"),
            })
        }
    };

    decoded.map_err(|e| SignatureError::Decode {
        what: "signature".to_string(),
        reason: e.to_string(),
    })
}
