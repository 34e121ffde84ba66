//! Batch and committee storage for the store backend.
//!
//! Header and roster columns hold JSON. Rows are returned undecoded so the
//! caller can tell a corrupt record apart from a database failure.

use super::{batch_to_db, Storage};
use alloy_primitives::{Bytes, B256};
use anyhow::{Context, Result};
use lsc_core::{BatchHeader, CommitteeHeader, Operator, Signer};
use sqlx::Row;

/// An attested batch as kept by the store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    /// Batch header
    pub batch_header: BatchHeader,
    /// Committee header the batch was attested under
    pub committee_header: CommitteeHeader,
    /// Aggregated BLS signature (empty until attested)
    pub agg_signature: Bytes,
    /// Operators whose signature shares are in the aggregate
    pub signers: Vec<Signer>,
}

/// Undecoded `batches` row.
#[derive(Debug, Clone)]
pub struct BatchRow {
    /// Batch header JSON
    pub batch_header: String,
    /// Committee header JSON
    pub committee_header: String,
    /// Aggregated signature bytes
    pub agg_signature: Vec<u8>,
    /// Signer list JSON
    pub signers: String,
}

impl BatchRow {
    /// Decode the JSON columns.
    pub fn decode(self) -> serde_json::Result<BatchRecord> {
        Ok(BatchRecord {
            batch_header: serde_json::from_str(&self.batch_header)?,
            committee_header: serde_json::from_str(&self.committee_header)?,
            agg_signature: Bytes::from(self.agg_signature),
            signers: serde_json::from_str(&self.signers)?,
        })
    }
}

impl Storage {
    /// Insert or replace the roster behind a committee root.
    pub async fn insert_committee(
        &self,
        chain_id: u32,
        root: &B256,
        operators: &[Operator],
    ) -> Result<()> {
        let operators_json =
            serde_json::to_string(operators).context("Failed to encode operators")?;

        sqlx::query(
            r#"
            INSERT INTO committee_roots (chain_id, current_committee_root, operators)
            VALUES (?, ?, ?)
            ON CONFLICT(chain_id, current_committee_root) DO UPDATE SET
                operators = excluded.operators
            "#,
        )
        .bind(i64::from(chain_id))
        .bind(root.as_slice())
        .bind(operators_json)
        .execute(&self.pool)
        .await
        .context("Failed to insert committee")?;

        Ok(())
    }

    /// Insert or replace an attested batch.
    pub async fn insert_batch(&self, record: &BatchRecord) -> Result<()> {
        let header = &record.batch_header;

        sqlx::query(
            r#"
            INSERT INTO batches (
                chain_id, batch_number, batch_header,
                committee_header, agg_signature, signers
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(chain_id, batch_number) DO UPDATE SET
                batch_header = excluded.batch_header,
                committee_header = excluded.committee_header,
                agg_signature = excluded.agg_signature,
                signers = excluded.signers
            "#,
        )
        .bind(i64::from(header.chain_id))
        .bind(batch_to_db(header.batch_number)?)
        .bind(serde_json::to_string(header).context("Failed to encode batch header")?)
        .bind(
            serde_json::to_string(&record.committee_header)
                .context("Failed to encode committee header")?,
        )
        .bind(record.agg_signature.as_ref())
        .bind(serde_json::to_string(&record.signers).context("Failed to encode signers")?)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to insert batch {} for chain {}",
                header.batch_number, header.chain_id
            )
        })?;

        Ok(())
    }

    /// Get a batch row.
    pub async fn get_batch(&self, chain_id: u32, batch_number: u64) -> Result<Option<BatchRow>> {
        let row = sqlx::query(
            r#"
            SELECT batch_header, committee_header, agg_signature, signers
            FROM batches
            WHERE chain_id = ? AND batch_number = ?
            "#,
        )
        .bind(i64::from(chain_id))
        .bind(batch_to_db(batch_number)?)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch batch")?;

        Ok(row.map(|row| BatchRow {
            batch_header: row.get("batch_header"),
            committee_header: row.get("committee_header"),
            agg_signature: row.get("agg_signature"),
            signers: row.get("signers"),
        }))
    }

    /// Get the roster JSON behind a committee root.
    pub async fn get_committee_operators(
        &self,
        chain_id: u32,
        root: &B256,
    ) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT operators
            FROM committee_roots
            WHERE chain_id = ? AND current_committee_root = ?
            "#,
        )
        .bind(i64::from(chain_id))
        .bind(root.as_slice())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch committee")?;

        Ok(row.map(|row| row.get("operators")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use tempfile::NamedTempFile;

    fn record() -> BatchRecord {
        BatchRecord {
            batch_header: BatchHeader {
                batch_number: 12,
                chain_id: 421614,
                l1_block_number: 900,
                l1_tx_hash: B256::repeat_byte(0x01),
                l1_tx_index: 4,
                l2_blocks: vec![],
            },
            committee_header: CommitteeHeader {
                current_committee_root: B256::repeat_byte(0xcc),
                next_committee_root: B256::repeat_byte(0xcc),
                total_voting_power: 10,
            },
            agg_signature: Bytes::from(vec![9u8; 64]),
            signers: vec![Signer {
                address: Address::repeat_byte(0x0a),
                public_key: Bytes::from(vec![1u8; 32]),
            }],
        }
    }

    #[tokio::test]
    async fn test_batch_roundtrip() {
        let _temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(_temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();

        assert!(storage.get_batch(421614, 12).await.unwrap().is_none());

        storage.insert_batch(&record()).await.unwrap();
        let row = storage.get_batch(421614, 12).await.unwrap().unwrap();
        assert_eq!(row.decode().unwrap(), record());

        assert!(storage.get_batch(421614, 13).await.unwrap().is_none());
        assert!(storage.get_batch(1, 12).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committee_lookup_by_root() {
        let _temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(_temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();

        let root = B256::repeat_byte(0xcc);
        let operators = vec![Operator::new(Address::repeat_byte(0x0a), vec![1u8; 32], 10)];
        storage.insert_committee(7, &root, &operators).await.unwrap();

        let json = storage
            .get_committee_operators(7, &root)
            .await
            .unwrap()
            .unwrap();
        let decoded: Vec<Operator> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, operators);

        assert!(storage
            .get_committee_operators(8, &root)
            .await
            .unwrap()
            .is_none());
    }
}
