//! Store backend: proofs assembled from local batch and committee tables.

use anyhow::Result;
use lsc_core::{derive_aggregation_bits, Operator, StateProof};
use tracing::debug;

use super::{DataSource, FetchError};
use crate::storage::Storage;

/// Serves proofs out of the `batches` and `committee_roots` tables.
///
/// A batch is joined with the committee whose root equals its
/// `current_committee_root`; aggregation bits are derived from the batch's
/// signer list.
#[derive(Debug, Clone)]
pub struct StoreSource {
    storage: Storage,
}

impl StoreSource {
    /// Create a store source over `storage`.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl DataSource for StoreSource {
    async fn fetch_batch_proof(
        &self,
        chain_id: u32,
        batch_number: u64,
    ) -> Result<StateProof, FetchError> {
        let not_found = FetchError::NotFoundYet {
            chain_id,
            batch_number,
        };

        let Some(row) = self
            .storage
            .get_batch(chain_id, batch_number)
            .await
            .map_err(FetchError::unavailable)?
        else {
            return Err(not_found);
        };

        let batch = row
            .decode()
            .map_err(|e| FetchError::Malformed(format!("batch record: {}", e)))?;

        if batch.agg_signature.is_empty() {
            debug!(chain_id, batch_number, "Batch present but not attested yet");
            return Err(not_found);
        }

        let root = batch.committee_header.current_committee_root;
        let Some(operators_json) = self
            .storage
            .get_committee_operators(chain_id, &root)
            .await
            .map_err(FetchError::unavailable)?
        else {
            debug!(chain_id, batch_number, %root, "Committee roster not stored yet");
            return Err(not_found);
        };

        let roster: Vec<Operator> = serde_json::from_str(&operators_json)
            .map_err(|e| FetchError::Malformed(format!("committee roster: {}", e)))?;

        let bits = derive_aggregation_bits(&roster, &batch.signers);

        StateProof::new(
            roster,
            bits,
            batch.agg_signature,
            batch.committee_header,
            batch.batch_header,
        )
        .map_err(|e| FetchError::Malformed(e.to_string()))
    }

    async fn get_checkpoint(&self, chain_id: u32) -> Result<Option<u64>> {
        self.storage.get_checkpoint(chain_id).await
    }

    async fn set_checkpoint(&self, chain_id: u32, batch_number: u64) -> Result<()> {
        self.storage.set_checkpoint(chain_id, batch_number).await
    }

    async fn record_failed_batch(
        &self,
        chain_id: u32,
        batch_number: u64,
        reason: &str,
    ) -> Result<()> {
        self.storage
            .record_failed_batch(chain_id, batch_number, reason)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BatchRecord;
    use alloy_primitives::{Address, Bytes, B256};
    use lsc_core::{BatchHeader, CommitteeHeader, Signer};
    use tempfile::NamedTempFile;

    async fn source() -> (StoreSource, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        (StoreSource::new(storage), temp_db)
    }

    fn roster() -> Vec<Operator> {
        (1..=3u8)
            .map(|i| Operator::new(Address::repeat_byte(i), vec![i; 32], 100))
            .collect()
    }

    fn record(batch_number: u64, signers: Vec<Signer>, signature: Vec<u8>) -> BatchRecord {
        BatchRecord {
            batch_header: BatchHeader {
                batch_number,
                chain_id: 10,
                l1_block_number: 1,
                l1_tx_hash: B256::ZERO,
                l1_tx_index: 0,
                l2_blocks: vec![],
            },
            committee_header: CommitteeHeader {
                current_committee_root: B256::repeat_byte(0xaa),
                next_committee_root: B256::repeat_byte(0xaa),
                total_voting_power: 300,
            },
            agg_signature: Bytes::from(signature),
            signers,
        }
    }

    fn signer(op: &Operator) -> Signer {
        Signer {
            address: op.address,
            public_key: op.bls_public_key.clone(),
        }
    }

    #[tokio::test]
    async fn test_missing_batch_is_not_found() {
        let (source, _temp_db) = source().await;
        let err = source.fetch_batch_proof(10, 1).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::NotFoundYet {
                chain_id: 10,
                batch_number: 1
            }
        );
    }

    #[tokio::test]
    async fn test_unsigned_batch_is_not_found() {
        let (source, _temp_db) = source().await;
        source
            .storage()
            .insert_committee(10, &B256::repeat_byte(0xaa), &roster())
            .await
            .unwrap();
        source
            .storage()
            .insert_batch(&record(1, vec![], vec![]))
            .await
            .unwrap();

        let err = source.fetch_batch_proof(10, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFoundYet { .. }));
    }

    #[tokio::test]
    async fn test_missing_committee_is_not_found() {
        let (source, _temp_db) = source().await;
        source
            .storage()
            .insert_batch(&record(1, vec![], vec![7u8; 64]))
            .await
            .unwrap();

        let err = source.fetch_batch_proof(10, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFoundYet { .. }));
    }

    #[tokio::test]
    async fn test_join_derives_bits_from_signers() {
        let (source, _temp_db) = source().await;
        let roster = roster();
        // Signer list order is irrelevant; a key/address mismatch does not count.
        let mut impostor = signer(&roster[1]);
        impostor.public_key = Bytes::from(vec![0xff; 32]);
        let signers = vec![signer(&roster[2]), impostor, signer(&roster[0])];

        source
            .storage()
            .insert_committee(10, &B256::repeat_byte(0xaa), &roster)
            .await
            .unwrap();
        source
            .storage()
            .insert_batch(&record(4, signers, vec![7u8; 64]))
            .await
            .unwrap();

        let proof = source.fetch_batch_proof(10, 4).await.unwrap();
        assert_eq!(proof.roster(), roster.as_slice());
        assert_eq!(proof.aggregation_bits(), &[true, false, true]);
        assert_eq!(proof.aggregated_signature(), &[7u8; 64][..]);
        assert_eq!(proof.batch_number(), 4);
    }

    #[tokio::test]
    async fn test_corrupt_roster_is_malformed() {
        let (source, _temp_db) = source().await;
        source
            .storage()
            .insert_batch(&record(1, vec![], vec![7u8; 64]))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO committee_roots (chain_id, current_committee_root, operators) VALUES (?, ?, ?)",
        )
        .bind(10i64)
        .bind(B256::repeat_byte(0xaa).as_slice())
        .bind("not json")
        .execute(source.storage().pool())
        .await
        .unwrap();

        let err = source.fetch_batch_proof(10, 1).await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_progress_goes_to_ledger() {
        let (source, _temp_db) = source().await;

        assert_eq!(source.get_checkpoint(10).await.unwrap(), None);
        source.set_checkpoint(10, 3).await.unwrap();
        source.record_failed_batch(10, 2, "root_mismatch").await.unwrap();

        assert_eq!(source.get_checkpoint(10).await.unwrap(), Some(3));
        let failed = source.storage().get_failed_batches(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].batch_number, 2);
    }
}
