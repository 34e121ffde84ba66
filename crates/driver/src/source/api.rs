//! HTTP API backend.

use std::time::Duration;

use anyhow::{Context, Result};
use lsc_core::StateProof;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{DataSource, FetchError};
use crate::storage::Storage;

/// Header carrying the API key, when one is configured.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Marker the API puts in error bodies for batches it has not indexed yet.
const NO_RESULTS_MARKER: &str = "no results found";

/// Fetches proofs from `GET {api_url}/batches/state-proofs` and keeps
/// progress in the local ledger.
#[derive(Debug, Clone)]
pub struct ApiSource {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    ledger: Storage,
}

impl ApiSource {
    /// Build an API source.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        ledger: Storage,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("state-verifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build proof API HTTP client")?;

        let api_url = api_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            api_url,
            api_key,
            ledger,
        })
    }

    /// Endpoint serving state proofs.
    pub fn endpoint(&self) -> String {
        format!("{}/batches/state-proofs", self.api_url)
    }

    /// Progress ledger.
    pub fn ledger(&self) -> &Storage {
        &self.ledger
    }
}

/// Map an API response to a proof or a fetch failure.
///
/// Only a successful response whose body is not a usable proof is malformed.
/// Every other error status (auth, rate limiting, timeouts, server faults)
/// is retried on the same batch.
pub(crate) fn classify_response(
    status: StatusCode,
    body: &[u8],
    chain_id: u32,
    batch_number: u64,
) -> Result<StateProof, FetchError> {
    let not_found = FetchError::NotFoundYet {
        chain_id,
        batch_number,
    };

    if status == StatusCode::NOT_FOUND {
        return Err(not_found);
    }
    if !status.is_success() {
        let text = String::from_utf8_lossy(body);
        if text.contains(NO_RESULTS_MARKER) {
            return Err(not_found);
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(chain_id, batch_number, %status, "Proof API rejected the API key");
        }
        return Err(FetchError::Unavailable(format!("{}: {}", status, text.trim())));
    }

    let proof: StateProof =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    // The API answers with an empty signature for batches it knows about but
    // has not attested yet.
    if proof.aggregated_signature().is_empty() {
        return Err(not_found);
    }

    Ok(proof)
}

impl DataSource for ApiSource {
    async fn fetch_batch_proof(
        &self,
        chain_id: u32,
        batch_number: u64,
    ) -> Result<StateProof, FetchError> {
        debug!(chain_id, batch_number, "Requesting state proof");

        let mut request = self.client.get(self.endpoint()).query(&[
            ("chain_id", u64::from(chain_id)),
            ("batch_number", batch_number),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(FetchError::unavailable)?;
        let status = response.status();
        let body = response.bytes().await.map_err(FetchError::unavailable)?;

        classify_response(status, &body, chain_id, batch_number)
    }

    async fn get_checkpoint(&self, chain_id: u32) -> Result<Option<u64>> {
        self.ledger.get_checkpoint(chain_id).await
    }

    async fn set_checkpoint(&self, chain_id: u32, batch_number: u64) -> Result<()> {
        self.ledger.set_checkpoint(chain_id, batch_number).await
    }

    async fn record_failed_batch(
        &self,
        chain_id: u32,
        batch_number: u64,
        reason: &str,
    ) -> Result<()> {
        self.ledger
            .record_failed_batch(chain_id, batch_number, reason)
            .await
    }
}
