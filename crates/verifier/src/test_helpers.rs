//! Deterministic BN254 signer for fixtures.
//!
//! Keys are derived from small integers so fixtures are reproducible across
//! runs. Never use these keys outside tests.

use ark_bn254::{Fr, G1Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Zero;
use ark_serialize::CanonicalSerialize;

use crate::bn254::hash_to_g2;

/// A BN254 key pair with a fixed secret.
#[derive(Debug, Clone, Copy)]
pub struct TestSigner {
    secret: Fr,
}

impl TestSigner {
    /// Signer with secret key `seed` (must be non-zero).
    pub fn new(seed: u64) -> Self {
        Self {
            secret: Fr::from(seed),
        }
    }

    /// Compressed G1 public key.
    pub fn public_key(&self) -> Vec<u8> {
        compressed(&(G1Affine::generator() * self.secret).into_affine())
    }

    /// Uncompressed G1 public key.
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        uncompressed(&(G1Affine::generator() * self.secret).into_affine())
    }

    /// Compressed G2 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        compressed(&self.sign_point(message).into_affine())
    }

    /// Uncompressed G2 signature over `message`.
    pub fn sign_uncompressed(&self, message: &[u8]) -> Vec<u8> {
        uncompressed(&self.sign_point(message).into_affine())
    }

    /// Compressed aggregate of every signer's signature over `message`.
    pub fn aggregate(signers: &[TestSigner], message: &[u8]) -> Vec<u8> {
        let sum = signers
            .iter()
            .fold(G2Projective::zero(), |acc, s| acc + s.sign_point(message));
        compressed(&sum.into_affine())
    }

    fn sign_point(&self, message: &[u8]) -> G2Projective {
        let h = hash_to_g2(message).expect("hash to G2");
        h * self.secret
    }
}

fn compressed<T: CanonicalSerialize>(point: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(point.compressed_size());
    point
        .serialize_compressed(&mut out)
        .expect("serialize into Vec");
    out
}

fn uncompressed<T: CanonicalSerialize>(point: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(point.uncompressed_size());
    point
        .serialize_uncompressed(&mut out)
        .expect("serialize into Vec");
    out
}
