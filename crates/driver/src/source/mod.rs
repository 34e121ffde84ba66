//! Proof data sources.
//!
//! A [`DataSource`] serves state proofs and persists verification progress
//! for the chain driver. Two backends exist:
//! - [`ApiSource`]: HTTP JSON API, progress kept in the local ledger
//! - [`StoreSource`]: proof tables in the local database

use std::future::Future;

use anyhow::Result;
use lsc_core::StateProof;
use thiserror::Error;

pub mod api;
pub mod store;

pub use api::ApiSource;
pub use store::StoreSource;

/// Why a proof could not be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The batch has not been produced (or attested) yet.
    #[error("Batch {batch_number} of chain {chain_id} is not available yet")]
    NotFoundYet {
        /// Chain ID
        chain_id: u32,
        /// Batch number
        batch_number: u64,
    },

    /// The source returned a record that is not a valid state proof.
    #[error("Malformed state proof record: {0}")]
    Malformed(String),

    /// Network or storage failure.
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Build a [`FetchError::Unavailable`] from any displayable error,
    /// keeping its cause chain.
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        FetchError::Unavailable(format!("{:#}", err.into()))
    }
}

/// Proof and progress capability consumed by the chain driver.
pub trait DataSource: Send + Sync {
    /// Fetch the proof of one batch.
    fn fetch_batch_proof(
        &self,
        chain_id: u32,
        batch_number: u64,
    ) -> impl Future<Output = Result<StateProof, FetchError>> + Send;

    /// Last checkpointed batch of a chain, if any.
    fn get_checkpoint(&self, chain_id: u32) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Record `batch_number` as the last processed batch of a chain.
    fn set_checkpoint(
        &self,
        chain_id: u32,
        batch_number: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append a batch to the failed-batch ledger.
    fn record_failed_batch(
        &self,
        chain_id: u32,
        batch_number: u64,
        reason: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
