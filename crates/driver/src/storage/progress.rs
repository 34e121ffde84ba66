//! Progress ledger: checkpoints and failed batches.

use super::{batch_from_db, batch_to_db, Storage};
use anyhow::{Context, Result};
use sqlx::Row;

/// One entry of the failed-batch ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBatch {
    /// Chain ID
    pub chain_id: u32,
    /// Batch number
    pub batch_number: u64,
    /// Verdict kind or fetch failure kind
    pub reason: String,
    /// Unix timestamp of the record
    pub recorded_at: i64,
}

/// Progress summary of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProgress {
    /// Chain ID
    pub chain_id: u32,
    /// Last processed batch
    pub checkpoint: Option<u64>,
    /// Number of failed-batch records
    pub failed_count: u64,
}

impl Storage {
    /// Get the last processed batch of a chain.
    pub async fn get_checkpoint(&self, chain_id: u32) -> Result<Option<u64>> {
        let row = sqlx::query(
            r#"
            SELECT batch_number
            FROM processed_batches
            WHERE chain_id = ?
            "#,
        )
        .bind(i64::from(chain_id))
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch checkpoint for chain {}", chain_id))?;

        row.map(|row| batch_from_db(row.get("batch_number")))
            .transpose()
    }

    /// Set the last processed batch of a chain.
    pub async fn set_checkpoint(&self, chain_id: u32, batch_number: u64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO processed_batches (chain_id, batch_number, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(chain_id) DO UPDATE SET
                batch_number = excluded.batch_number,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(i64::from(chain_id))
        .bind(batch_to_db(batch_number)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to set checkpoint for chain {}", chain_id))?;

        Ok(())
    }

    /// Append a batch to the failed-batch ledger.
    pub async fn record_failed_batch(
        &self,
        chain_id: u32,
        batch_number: u64,
        reason: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO failed_batches (chain_id, batch_number, reason, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(i64::from(chain_id))
        .bind(batch_to_db(batch_number)?)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to record failed batch {} for chain {}",
                batch_number, chain_id
            )
        })?;

        Ok(())
    }

    /// Get failed batches of a chain, oldest first.
    pub async fn get_failed_batches(&self, chain_id: u32) -> Result<Vec<FailedBatch>> {
        let rows = sqlx::query(
            r#"
            SELECT chain_id, batch_number, reason, recorded_at
            FROM failed_batches
            WHERE chain_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(i64::from(chain_id))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch failed batches")?;

        rows.into_iter()
            .map(|row| -> Result<FailedBatch> {
                Ok(FailedBatch {
                    chain_id: chain_from_db(row.get("chain_id"))?,
                    batch_number: batch_from_db(row.get("batch_number"))?,
                    reason: row.get("reason"),
                    recorded_at: row.get("recorded_at"),
                })
            })
            .collect()
    }

    /// Chains with a checkpoint or a failed batch, ascending.
    pub async fn known_chains(&self) -> Result<Vec<u32>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT chain_id FROM processed_batches
            UNION
            SELECT chain_id FROM failed_batches
            ORDER BY chain_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list chains")?;

        ids.into_iter().map(chain_from_db).collect()
    }

    /// Progress summary of a chain.
    pub async fn chain_progress(&self, chain_id: u32) -> Result<ChainProgress> {
        let checkpoint = self.get_checkpoint(chain_id).await?;

        let failed_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM failed_batches WHERE chain_id = ?")
                .bind(i64::from(chain_id))
                .fetch_one(&self.pool)
                .await
                .context("Failed to count failed batches")?;

        Ok(ChainProgress {
            chain_id,
            checkpoint,
            failed_count: u64::try_from(failed_count).context("Negative failed batch count")?,
        })
    }
}

fn chain_from_db(value: i64) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("Chain ID {} out of range in database", value))
}
