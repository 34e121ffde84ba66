//! Per-chain verification driver.
//!
//! One [`ChainDriver`] runs per configured chain. Each cycle walks an explicit
//! state machine:
//!
//! ```text
//! Fetching ──proof──▶ Verifying ──verdict──▶ Recording ──▶ Idle (short), next batch
//!    │                                          ▲
//!    ├─ not produced yet ─▶ Idle (long), same batch
//!    ├─ infrastructure error ─▶ Idle (retry), same batch
//!    └─ malformed / retries exhausted ──────────┘
//! ```
//!
//! Every path through `Recording` advances the cursor, whatever the verdict.

use std::time::Duration;

use anyhow::{Context, Result};
use lsc_core::{CommitteeHeader, StateProof};
use lsc_verifier::{AggregateVerifier, ProofVerifier, Verdict};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{ChainConfig, FetchErrorPolicy, PollingConfig};
use crate::source::{DataSource, FetchError};

/// Ledger reason for a record that is not a valid state proof.
pub const REASON_MALFORMED: &str = "malformed";

/// Ledger reason for a batch abandoned after fetch failures.
pub const REASON_FETCH_FAILED: &str = "fetch_failed";

/// How processing of one batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// All checks passed.
    Verified(CommitteeHeader),
    /// The batch is recorded as failed.
    Failed {
        /// Ledger reason (verdict kind or fetch failure kind)
        reason: &'static str,
        /// Committee header of the batch, when a proof was obtained
        header: Option<CommitteeHeader>,
    },
}

impl Outcome {
    fn header(&self) -> Option<CommitteeHeader> {
        match self {
            Outcome::Verified(header) => Some(*header),
            Outcome::Failed { header, .. } => *header,
        }
    }
}

enum DriverState {
    Fetching,
    Verifying(Box<StateProof>),
    Recording(Outcome),
    Idle(Duration),
}

/// Sequential verification loop of one chain.
pub struct ChainDriver<S, V> {
    chain: ChainConfig,
    source: S,
    verifier: ProofVerifier<V>,
    polling: PollingConfig,
    cursor: u64,
    last_committee: Option<CommitteeHeader>,
    fetch_failures: u32,
}

impl<S, V> ChainDriver<S, V>
where
    S: DataSource,
    V: AggregateVerifier + Send + Sync,
{
    /// Create a driver. Call [`ChainDriver::initialize`] (or [`ChainDriver::run`])
    /// before cycling.
    pub fn new(
        chain: ChainConfig,
        source: S,
        verifier: ProofVerifier<V>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            chain,
            source,
            verifier,
            polling,
            cursor: chain.from_batch_number,
            last_committee: None,
            fetch_failures: 0,
        }
    }

    /// Chain this driver verifies.
    pub fn chain_id(&self) -> u32 {
        self.chain.chain_id
    }

    /// Next batch to fetch.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Committee header of the last processed batch.
    pub fn last_committee(&self) -> Option<&CommitteeHeader> {
        self.last_committee.as_ref()
    }

    /// Seed the cursor from the checkpoint and the continuity state from the
    /// batch before it.
    ///
    /// Failing to read the checkpoint is fatal for this chain.
    pub async fn initialize(&mut self) -> Result<()> {
        let chain_id = self.chain.chain_id;

        let checkpoint = self
            .source
            .get_checkpoint(chain_id)
            .await
            .with_context(|| format!("Failed to read checkpoint for chain {}", chain_id))?;

        self.cursor = match checkpoint {
            Some(last) => last.saturating_add(1).max(self.chain.from_batch_number),
            None => self.chain.from_batch_number,
        };
        self.last_committee = None;
        self.fetch_failures = 0;

        info!(
            "Chain {}: checkpoint={:?}, starting at batch {}",
            chain_id, checkpoint, self.cursor
        );

        if self.cursor > 1 {
            let previous = self.cursor - 1;
            match self.source.fetch_batch_proof(chain_id, previous).await {
                Ok(proof) => {
                    debug!(
                        "Chain {}: continuity seeded from batch {}",
                        chain_id, previous
                    );
                    self.last_committee = Some(*proof.committee_header());
                }
                Err(e) => {
                    warn!(
                        "Chain {}: could not seed continuity from batch {}: {}",
                        chain_id, previous, e
                    );
                }
            }
        }

        Ok(())
    }

    /// Process the batch at the cursor and return how long to sleep before
    /// the next cycle.
    pub async fn cycle(&mut self) -> Duration {
        let mut state = DriverState::Fetching;
        loop {
            state = match state {
                DriverState::Fetching => self.fetch().await,
                DriverState::Verifying(proof) => self.verify(&proof),
                DriverState::Recording(outcome) => self.record(outcome).await,
                DriverState::Idle(sleep) => return sleep,
            };
        }
    }

    async fn fetch(&mut self) -> DriverState {
        let chain_id = self.chain.chain_id;
        let batch_number = self.cursor;

        debug!("Chain {}: fetching batch {}", chain_id, batch_number);

        match self.source.fetch_batch_proof(chain_id, batch_number).await {
            Ok(proof) => {
                self.fetch_failures = 0;
                if proof.chain_id() != chain_id || proof.batch_number() != batch_number {
                    error!(
                        "Chain {}: requested batch {}, source returned chain {} batch {}",
                        chain_id,
                        batch_number,
                        proof.chain_id(),
                        proof.batch_number()
                    );
                    return DriverState::Recording(Outcome::Failed {
                        reason: REASON_MALFORMED,
                        header: None,
                    });
                }
                DriverState::Verifying(Box::new(proof))
            }
            Err(FetchError::NotFoundYet { .. }) => {
                self.fetch_failures = 0;
                info!(
                    "Chain {}: batch {} {}, waiting {}s",
                    chain_id,
                    batch_number,
                    Verdict::TransientUnavailable,
                    self.polling.new_batch_sleep_secs
                );
                DriverState::Idle(self.polling.new_batch_sleep())
            }
            Err(FetchError::Malformed(reason)) => {
                error!(
                    "Chain {}: batch {} is malformed: {}",
                    chain_id, batch_number, reason
                );
                DriverState::Recording(Outcome::Failed {
                    reason: REASON_MALFORMED,
                    header: None,
                })
            }
            Err(FetchError::Unavailable(reason)) => {
                self.fetch_failures = self.fetch_failures.saturating_add(1);
                warn!(
                    "Chain {}: failed to fetch batch {} (attempt {}): {}",
                    chain_id, batch_number, self.fetch_failures, reason
                );

                let give_up = match self.polling.fetch_error_policy {
                    FetchErrorPolicy::Skip => true,
                    FetchErrorPolicy::Retry => self
                        .polling
                        .max_fetch_retries
                        .is_some_and(|max| self.fetch_failures > max),
                };

                if give_up {
                    error!(
                        "Chain {}: giving up on batch {} after {} failed fetches",
                        chain_id, batch_number, self.fetch_failures
                    );
                    DriverState::Recording(Outcome::Failed {
                        reason: REASON_FETCH_FAILED,
                        header: None,
                    })
                } else {
                    DriverState::Idle(self.polling.retry_sleep())
                }
            }
        }
    }

    fn verify(&self, proof: &StateProof) -> DriverState {
        let header = *proof.committee_header();
        let verdict = self.verifier.verify(proof, self.last_committee.as_ref());

        let outcome = match verdict {
            Verdict::Verified => {
                info!(
                    "Chain {}: batch {} verified ({} of {} operators signed)",
                    self.chain.chain_id,
                    self.cursor,
                    proof.signer_count(),
                    proof.roster().len()
                );
                Outcome::Verified(header)
            }
            failure => {
                error!(
                    "Chain {}: batch {} failed verification: {}",
                    self.chain.chain_id, self.cursor, failure
                );
                Outcome::Failed {
                    reason: failure.kind(),
                    header: Some(header),
                }
            }
        };

        DriverState::Recording(outcome)
    }

    async fn record(&mut self, outcome: Outcome) -> DriverState {
        let chain_id = self.chain.chain_id;
        let batch_number = self.cursor;

        if let Outcome::Failed { reason, .. } = &outcome {
            if let Err(e) = self
                .source
                .record_failed_batch(chain_id, batch_number, reason)
                .await
            {
                error!(
                    "Chain {}: failed to record failed batch {}: {:#}",
                    chain_id, batch_number, e
                );
            }
        }

        if let Err(e) = self.source.set_checkpoint(chain_id, batch_number).await {
            error!(
                "Chain {}: failed to checkpoint batch {}: {:#}",
                chain_id, batch_number, e
            );
        }

        // Without a header the next batch has nothing to be linked against.
        self.last_committee = outcome.header();
        self.cursor = batch_number.saturating_add(1);
        self.fetch_failures = 0;

        DriverState::Idle(self.polling.historical_batch_sleep())
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown is observed between cycles and while sleeping.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.initialize().await?;

        info!("Chain {}: driver started", self.chain.chain_id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let sleep = self.cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "Chain {}: driver stopped at batch {}",
            self.chain.chain_id, self.cursor
        );

        Ok(())
    }
}
