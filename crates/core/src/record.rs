//! Wire shape of a state proof record.
//!
//! Data sources deliver proofs as three parallel per-operator lists plus a bit
//! vector. [`StateProofRecord`] mirrors that shape; converting it into a
//! [`StateProof`] enforces that all four lists are index-aligned.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{BatchHeader, CommitteeHeader, Operator, StateProof};

/// JSON record of a state proof, as served by the proof API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateProofRecord {
    /// Operator addresses, roster order.
    #[serde(rename = "addresses")]
    pub operator_addresses: Vec<Address>,

    /// BLS public keys, roster order.
    #[serde(rename = "public_keys")]
    pub bls_public_keys: Vec<Bytes>,

    /// Voting powers, roster order.
    pub voting_powers: Vec<u64>,

    /// Aggregation bits (0 or 1), roster order.
    #[serde(default)]
    pub aggregation_bits: Vec<u8>,

    /// Aggregated BLS signature.
    #[serde(rename = "agg_signature", alias = "aggregated_signature", default)]
    pub aggregated_signature: Bytes,

    /// Committee header.
    pub committee_header: CommitteeHeader,

    /// Batch header.
    pub batch_header: BatchHeader,
}

impl TryFrom<StateProofRecord> for StateProof {
    type Error = CoreError;

    fn try_from(record: StateProofRecord) -> Result<Self, Self::Error> {
        let expected = record.operator_addresses.len();

        if record.bls_public_keys.len() != expected {
            return Err(CoreError::LengthMismatch {
                field: "public_keys",
                expected,
                actual: record.bls_public_keys.len(),
            });
        }
        if record.voting_powers.len() != expected {
            return Err(CoreError::LengthMismatch {
                field: "voting_powers",
                expected,
                actual: record.voting_powers.len(),
            });
        }

        let aggregation_bits = record
            .aggregation_bits
            .iter()
            .enumerate()
            .map(|(index, &value)| match value {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(CoreError::InvalidAggregationBit { index, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let roster = record
            .operator_addresses
            .into_iter()
            .zip(record.bls_public_keys)
            .zip(record.voting_powers)
            .map(|((address, key), power)| Operator::new(address, key, power))
            .collect();

        StateProof::new(
            roster,
            aggregation_bits,
            record.aggregated_signature,
            record.committee_header,
            record.batch_header,
        )
    }
}

impl From<StateProof> for StateProofRecord {
    fn from(proof: StateProof) -> Self {
        let (roster, bits, aggregated_signature, committee_header, batch_header) =
            proof.into_parts();

        let mut operator_addresses = Vec::with_capacity(roster.len());
        let mut bls_public_keys = Vec::with_capacity(roster.len());
        let mut voting_powers = Vec::with_capacity(roster.len());
        for op in roster {
            operator_addresses.push(op.address);
            bls_public_keys.push(op.bls_public_key);
            voting_powers.push(op.voting_power);
        }

        Self {
            operator_addresses,
            bls_public_keys,
            voting_powers,
            aggregation_bits: bits.into_iter().map(u8::from).collect(),
            aggregated_signature,
            committee_header,
            batch_header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    const SAMPLE: &str = r#"{
        "addresses": [
            "0x6E654b122377EA7f592bf3FD5bcdE9e8c1B1cEb9",
            "0x516D6C27C23CEd21BF7930E2a01F0BcA9A141a0d",
            "0x4d694DE17246086d6451D732Ea8EA2a9a76dC997"
        ],
        "public_keys": ["0xaaaa", "bbbb", "0xcccc"],
        "voting_powers": [1000000, 1000000, 1000000],
        "aggregation_bits": [1, 0, 1],
        "agg_signature": "0x0102030405",
        "committee_header": {
            "current_committee": "0x2e3d2e5c97ee5320cccfd50434daeab6b0072558b693bb0e7f2eeca97741e514",
            "next_committee": "0x2e3d2e5c97ee5320cccfd50434daeab6b0072558b693bb0e7f2eeca97741e514",
            "total_voting_power": 3000000
        },
        "batch_header": {
            "batch_number": 32840,
            "chain_id": 421614,
            "l1_block_number": 5555,
            "l1_tx_hash": "0x95aea085c0d4a908eed989c9f2c793477d53309ae3e9f0a28f29510ffeff2b91",
            "l1_tx_index": 3,
            "l2_blocks": [
                {"block_number": 1, "block_hash": "0x0101010101010101010101010101010101010101010101010101010101010101"},
                {"block_number": 2, "block_hash": "0x0202020202020202020202020202020202020202020202020202020202020202"}
            ]
        }
    }"#;

    #[test]
    fn test_decode_sample_record() {
        let proof: StateProof = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(proof.roster().len(), 3);
        assert_eq!(proof.aggregation_bits(), &[true, false, true]);
        assert_eq!(proof.roster()[1].bls_public_key.as_ref(), &[0xbb, 0xbb]);
        assert_eq!(proof.aggregated_signature(), &[1, 2, 3, 4, 5]);
        assert_eq!(proof.committee_header().total_voting_power, 3_000_000);
        assert_eq!(proof.batch_number(), 32840);
        assert_eq!(proof.batch_header().l2_blocks.len(), 2);
        assert_eq!(
            proof.batch_header().l2_blocks[1].block_hash,
            B256::repeat_byte(0x02)
        );
    }

    #[test]
    fn test_decode_accepts_aggregated_signature_alias() {
        let json = SAMPLE.replace("agg_signature", "aggregated_signature");
        let proof: StateProof = serde_json::from_str(&json).unwrap();
        assert_eq!(proof.aggregated_signature(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_decode_rejects_short_voting_powers() {
        let json = SAMPLE.replace(
            "[1000000, 1000000, 1000000]",
            "[1000000, 1000000]",
        );
        let err = serde_json::from_str::<StateProof>(&json).unwrap_err();
        assert!(err.to_string().contains("voting_powers"), "{err}");
    }

    #[test]
    fn test_decode_rejects_non_binary_bit() {
        let json = SAMPLE.replace("[1, 0, 1]", "[1, 2, 1]");
        let err = serde_json::from_str::<StateProof>(&json).unwrap_err();
        assert!(err.to_string().contains("index 1"), "{err}");
    }

    #[test]
    fn test_decode_rejects_missing_bits() {
        let json = SAMPLE.replace("\"aggregation_bits\": [1, 0, 1],", "");
        let err = serde_json::from_str::<StateProof>(&json).unwrap_err();
        assert!(err.to_string().contains("aggregation_bits"), "{err}");
    }

    #[test]
    fn test_record_reencodes_to_same_proof() {
        let proof: StateProof = serde_json::from_str(SAMPLE).unwrap();
        let encoded = serde_json::to_string(&proof).unwrap();
        let decoded: StateProof = serde_json::from_str(&encoded).unwrap();
        assert_eq!(proof, decoded);
    }
}
