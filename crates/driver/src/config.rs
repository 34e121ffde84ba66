//! Configuration management for the state proof verifier.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - Environment variables (`${VAR}` placeholders and `STATE_VERIFIER_*` overrides)
//! - Default values (fallbacks)

use anyhow::{Context, Result};
use lsc_verifier::{BlsCurve, Bn254Verifier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `source.api_url`.
pub const ENV_API_URL: &str = "STATE_VERIFIER_API_URL";
/// Environment variable overriding `source.api_key`.
pub const ENV_API_KEY: &str = "STATE_VERIFIER_API_KEY";
/// Environment variable overriding `database.url`.
pub const ENV_DATABASE_URL: &str = "STATE_VERIFIER_DATABASE_URL";

/// Main configuration for the verifier service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proof data source
    #[serde(default)]
    pub source: SourceConfig,

    /// Database configuration (progress ledger, and proofs for the store backend)
    pub database: DatabaseConfig,

    /// Chains to verify
    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    /// Polling and backoff
    #[serde(default)]
    pub polling: PollingConfig,

    /// Signature verification
    #[serde(default)]
    pub verifier: VerifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which data source backend serves proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// HTTP JSON API.
    #[default]
    Api,
    /// Proof tables in the configured database.
    Store,
}

/// Data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the proof API (required for the `api` backend)
    #[serde(default)]
    pub api_url: Option<String>,

    /// API key sent as `x-api-key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_url: None,
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://state-verifier.db")
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// One chain to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain ID
    pub chain_id: u32,

    /// First batch to verify when no checkpoint exists
    #[serde(default)]
    pub from_batch_number: u64,
}

/// What to do when fetching a batch fails for a reason other than
/// "not produced yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Retry the same batch after `retry_sleep_secs`.
    #[default]
    Retry,
    /// Record the batch as failed and move on.
    Skip,
}

/// Polling configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep while waiting for a batch that has not been produced yet
    #[serde(default = "default_new_batch_sleep_secs")]
    pub new_batch_sleep_secs: u64,

    /// Sleep between consecutive batches while catching up
    #[serde(default = "default_historical_batch_sleep_secs")]
    pub historical_batch_sleep_secs: u64,

    /// Sleep before retrying a failed fetch
    #[serde(default = "default_retry_sleep_secs")]
    pub retry_sleep_secs: u64,

    /// Fetch failure handling
    #[serde(default)]
    pub fetch_error_policy: FetchErrorPolicy,

    /// Give up on a batch after this many consecutive failed fetches (retry policy only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fetch_retries: Option<u32>,
}

impl PollingConfig {
    /// Long backoff used while a batch is not available yet.
    pub fn new_batch_sleep(&self) -> Duration {
        Duration::from_secs(self.new_batch_sleep_secs)
    }

    /// Short sleep between batches.
    pub fn historical_batch_sleep(&self) -> Duration {
        Duration::from_secs(self.historical_batch_sleep_secs)
    }

    /// Short backoff after an infrastructure error.
    pub fn retry_sleep(&self) -> Duration {
        Duration::from_secs(self.retry_sleep_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            new_batch_sleep_secs: default_new_batch_sleep_secs(),
            historical_batch_sleep_secs: default_historical_batch_sleep_secs(),
            retry_sleep_secs: default_retry_sleep_secs(),
            fetch_error_policy: FetchErrorPolicy::default(),
            max_fetch_retries: None,
        }
    }
}

/// Signature verification configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// BLS curve the committee signs on
    #[serde(default)]
    pub curve: BlsCurve,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_new_batch_sleep_secs() -> u64 {
    300 // 5 minutes
}

fn default_historical_batch_sleep_secs() -> u64 {
    1
}

fn default_retry_sleep_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax,
    /// e.g. `api_key = "${PROOF_API_KEY}"`. `STATE_VERIFIER_API_URL`,
    /// `STATE_VERIFIER_API_KEY` and `STATE_VERIFIER_DATABASE_URL` override
    /// the file.
    ///
    /// # Example
    /// ```no_run
    /// # use lsc_driver::config::Config;
    /// let config = Config::from_file("state-verifier.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // Expand environment variables before parsing
        let expanded = expand_env_vars(&contents)?;

        let mut config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string (no environment handling).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Apply `STATE_VERIFIER_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.source.api_url = Some(url);
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.source.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            self.database.url = url;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        // Validate chains
        if self.chains.is_empty() {
            anyhow::bail!("At least one [[chains]] entry is required");
        }
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if chain.chain_id == 0 {
                anyhow::bail!("Chain ID must be non-zero");
            }
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain {} is configured more than once", chain.chain_id);
            }
        }

        // Validate source
        if self.source.backend == Backend::Api {
            match self.source.api_url.as_deref().map(str::trim) {
                None | Some("") => {
                    anyhow::bail!("Source api_url is required for the api backend")
                }
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    anyhow::bail!("Source api_url must start with http:// or https:// (got '{}')", url)
                }
                Some(_) => {}
            }
        }
        if self.source.request_timeout_secs == 0 {
            anyhow::bail!("Source request_timeout_secs must be > 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate connection pool settings
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        // Validate polling settings
        if self.polling.new_batch_sleep_secs == 0 {
            anyhow::bail!("Polling new_batch_sleep_secs must be > 0");
        }
        if self.polling.historical_batch_sleep_secs == 0 {
            anyhow::bail!("Polling historical_batch_sleep_secs must be > 0");
        }
        if self.polling.retry_sleep_secs == 0 {
            anyhow::bail!("Polling retry_sleep_secs must be > 0");
        }

        // Validate signature curve
        if !Bn254Verifier::supports(self.verifier.curve) {
            anyhow::bail!(
                "Verifier curve '{}' has no signature verifier (supported: {})",
                self.verifier.curve,
                BlsCurve::Bn254
            );
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        // Validate logging format
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Placeholders inside TOML comments (after `#` outside a string) are left
/// alone. Referencing an unset variable is an error.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_double_quote = false;
    let mut in_single_quote = false;
    let mut in_comment = false;
    let mut escape_next = false;
    let mut pos = 0;

    while let Some(ch) = chars.next() {
        pos += 1;

        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
                result.push(ch);
            }
            '"' if !in_single_quote && !in_comment => {
                in_double_quote = !in_double_quote;
                result.push(ch);
            }
            '\'' if !in_double_quote && !in_comment => {
                in_single_quote = !in_single_quote;
                result.push(ch);
            }
            '#' if !in_double_quote && !in_single_quote => {
                in_comment = true;
                result.push(ch);
            }
            '\n' => {
                // Multiline strings are not tracked.
                in_comment = false;
                in_double_quote = false;
                in_single_quote = false;
                result.push(ch);
            }
            '$' if !in_comment && chars.peek() == Some(&'{') => {
                chars.next();
                pos += 1;

                let mut var_name = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    pos += 1;
                    if c == '}' {
                        found_close = true;
                        break;
                    }
                    var_name.push(c);
                }

                if !found_close {
                    anyhow::bail!(
                        "Unclosed environment variable placeholder at position {}",
                        pos
                    );
                }
                if var_name.is_empty() {
                    anyhow::bail!("Empty environment variable name at position {}", pos);
                }

                match std::env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => anyhow::bail!(
                        "Environment variable '{}' is not set (referenced at position {})",
                        var_name,
                        pos
                    ),
                }
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}
