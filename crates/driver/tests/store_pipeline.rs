use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use lsc_core::{BatchHeader, CommitteeHeader, KeccakBatchDigest, Operator, Signer};
use lsc_driver::config::{ChainConfig, PollingConfig};
use lsc_driver::storage::BatchRecord;
use lsc_driver::{ChainDriver, Storage, StoreSource};
use lsc_merkle::committee_root;
use lsc_verifier::{canonical_message, test_helpers::TestSigner, ProofVerifier};
use tempfile::NamedTempFile;

const CHAIN_ID: u32 = 11155420;

struct Committee {
    signers: Vec<TestSigner>,
    roster: Vec<Operator>,
    root: B256,
}

fn committee() -> Committee {
    let signers: Vec<TestSigner> = (201..=204).map(TestSigner::new).collect();
    let roster: Vec<Operator> = signers
        .iter()
        .enumerate()
        .map(|(i, s)| Operator::new(Address::repeat_byte(0x40 + i as u8), s.public_key(), 250))
        .collect();
    let root = committee_root(&roster).unwrap();
    Committee {
        signers,
        roster,
        root,
    }
}

fn batch_header(number: u64) -> BatchHeader {
    BatchHeader {
        batch_number: number,
        chain_id: CHAIN_ID,
        l1_block_number: 7_000_000 + number,
        l1_tx_hash: B256::repeat_byte(number as u8),
        l1_tx_index: 2,
        l2_blocks: vec![],
    }
}

/// Batch signed by the operators at `signing`; `sign_as` picks the batch
/// whose message is actually signed.
fn record(c: &Committee, number: u64, signing: &[usize], sign_as: u64) -> BatchRecord {
    let committee_header = CommitteeHeader {
        current_committee_root: c.root,
        next_committee_root: c.root,
        total_voting_power: 1000,
    };
    let message = canonical_message(&KeccakBatchDigest, &batch_header(sign_as), &committee_header);

    let keys: Vec<TestSigner> = signing.iter().map(|&i| c.signers[i]).collect();
    let signers = signing
        .iter()
        .map(|&i| Signer {
            address: c.roster[i].address,
            public_key: c.roster[i].bls_public_key.clone(),
        })
        .collect();

    BatchRecord {
        batch_header: batch_header(number),
        committee_header,
        agg_signature: Bytes::from(TestSigner::aggregate(&keys, message.as_slice())),
        signers,
    }
}

fn polling() -> PollingConfig {
    PollingConfig {
        new_batch_sleep_secs: 120,
        historical_batch_sleep_secs: 1,
        retry_sleep_secs: 3,
        ..Default::default()
    }
}

fn chain() -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID,
        from_batch_number: 1,
    }
}

#[tokio::test]
async fn store_backend_verifies_records_and_resumes() {
    let temp_db = NamedTempFile::new().unwrap();
    let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
    storage.run_migrations().await.unwrap();

    let c = committee();
    storage
        .insert_committee(CHAIN_ID, &c.root, &c.roster)
        .await
        .unwrap();

    // 1: 750 of 1000 signed. 2: exactly 500. 3: signature over another batch.
    // 4: signed by the last three operators, listed out of order.
    storage.insert_batch(&record(&c, 1, &[0, 1, 2], 1)).await.unwrap();
    storage.insert_batch(&record(&c, 2, &[0, 3], 2)).await.unwrap();
    storage.insert_batch(&record(&c, 3, &[0, 1, 2], 1)).await.unwrap();
    storage.insert_batch(&record(&c, 4, &[3, 1, 2], 4)).await.unwrap();

    let mut driver = ChainDriver::new(
        chain(),
        StoreSource::new(storage.clone()),
        ProofVerifier::bn254(),
        polling(),
    );
    driver.initialize().await.unwrap();
    assert_eq!(driver.cursor(), 1);

    for _ in 1..=4 {
        assert_eq!(driver.cycle().await, Duration::from_secs(1));
    }
    assert_eq!(driver.cursor(), 5);

    // Batch 5 does not exist yet.
    assert_eq!(driver.cycle().await, Duration::from_secs(120));
    assert_eq!(driver.cursor(), 5);

    let progress = storage.chain_progress(CHAIN_ID).await.unwrap();
    assert_eq!(progress.checkpoint, Some(4));
    assert_eq!(progress.failed_count, 2);

    let failed: Vec<(u64, String)> = storage
        .get_failed_batches(CHAIN_ID)
        .await
        .unwrap()
        .into_iter()
        .map(|f| (f.batch_number, f.reason))
        .collect();
    assert_eq!(
        failed,
        vec![
            (2, "quorum_failed".to_string()),
            (3, "signature_invalid".to_string())
        ]
    );

    // A restarted driver resumes after the checkpoint with continuity seeded.
    let mut restarted = ChainDriver::new(
        chain(),
        StoreSource::new(storage.clone()),
        ProofVerifier::bn254(),
        polling(),
    );
    restarted.initialize().await.unwrap();
    assert_eq!(restarted.cursor(), 5);
    assert_eq!(
        restarted.last_committee().map(|h| h.next_committee_root),
        Some(c.root)
    );

    storage.close().await;
}

#[tokio::test]
async fn store_backend_waits_for_committee_roster() {
    let temp_db = NamedTempFile::new().unwrap();
    let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
    storage.run_migrations().await.unwrap();

    let c = committee();
    storage.insert_batch(&record(&c, 1, &[0, 1, 2], 1)).await.unwrap();

    let mut driver = ChainDriver::new(
        chain(),
        StoreSource::new(storage.clone()),
        ProofVerifier::bn254(),
        polling(),
    );
    driver.initialize().await.unwrap();

    // Roster not stored yet: treated as not produced.
    assert_eq!(driver.cycle().await, Duration::from_secs(120));
    assert_eq!(driver.cursor(), 1);

    storage
        .insert_committee(CHAIN_ID, &c.root, &c.roster)
        .await
        .unwrap();

    assert_eq!(driver.cycle().await, Duration::from_secs(1));
    assert_eq!(driver.cursor(), 2);
    assert_eq!(storage.get_checkpoint(CHAIN_ID).await.unwrap(), Some(1));
    assert!(storage.get_failed_batches(CHAIN_ID).await.unwrap().is_empty());

    storage.close().await;
}
