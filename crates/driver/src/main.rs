//! State verifier - committee state proof verification service
//!
//! This binary provides:
//! - One verification driver per configured chain (API or store backend)
//! - Offline verification of a single state proof file
//! - Progress and failed-batch status from the local ledger

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lsc_core::StateProof;
use lsc_driver::config::{Backend, Config, LoggingConfig};
use lsc_driver::{ApiSource, ChainDriver, DataSource, Storage, StoreSource};
use lsc_verifier::{BlsCurve, Bn254Verifier, ProofVerifier};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://state-verifier.db";

#[derive(Parser)]
#[command(name = "state-verifier")]
#[command(version, about = "Verifier for committee-attested batch state proofs", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "STATE_VERIFIER_CONFIG", default_value = "state-verifier.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start one verification driver per configured chain
    Run,

    /// Verify a single JSON state proof offline
    Verify {
        /// State proof file
        #[arg(long)]
        proof: PathBuf,

        /// State proof of the previous batch, for the continuity check
        #[arg(long)]
        previous: Option<PathBuf>,

        /// BLS curve of the committee signature
        #[arg(long, default_value = "bn254")]
        curve: BlsCurve,
    },

    /// Show checkpoints and failed batches per chain
    Status,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = Config::from_file(&cli.config).context("Failed to load configuration")?;
            init_logging(cli.debug, Some(&config.logging))?;
            info!("State verifier starting...");
            info!("Version: {}", env!("CARGO_PKG_VERSION"));
            run_verifier(config).await?;
        }
        Commands::Verify {
            proof,
            previous,
            curve,
        } => {
            init_logging(cli.debug, None)?;
            verify_proof_file(&proof, previous.as_deref(), curve)?;
        }
        Commands::Status => {
            init_logging(cli.debug, None)?;
            show_status(&cli.config).await?;
        }
        Commands::InitDb { database_url } => {
            init_logging(cli.debug, None)?;
            init_database(&database_url).await?;
        }
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool, logging: Option<&LoggingConfig>) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = logging.map(|l| l.level.as_str()).unwrap_or("info");
    let env_filter = if debug {
        EnvFilter::new("lsc_driver=debug,state_verifier=debug,sqlx=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("lsc_driver={level},state_verifier={level}"))
        })
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.is_some_and(|l| l.format == "json") {
        registry
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }

    Ok(())
}

/// Main verifier service - one driver task per chain
async fn run_verifier(config: Config) -> Result<()> {
    info!("Configuration loaded successfully");
    info!("  Backend: {:?}", config.source.backend);
    info!("  Database: {}", config.database.url);
    info!("  Curve: {}", config.verifier.curve);
    info!(
        "  Fetch error policy: {:?} (max retries: {:?})",
        config.polling.fetch_error_policy, config.polling.max_fetch_retries
    );
    for chain in &config.chains {
        info!(
            "  Chain {} from batch {}",
            chain.chain_id, chain.from_batch_number
        );
    }

    let storage = Storage::new(
        &config.database.url,
        Some(config.database.max_connections),
        Some(config.database.min_connections),
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    info!("Database initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut drivers = JoinSet::new();

    match config.source.backend {
        Backend::Api => {
            let api_url = config
                .source
                .api_url
                .clone()
                .context("Source api_url is required for the api backend")?;
            let source = ApiSource::new(
                api_url,
                config.source.api_key.clone(),
                config.source.request_timeout_secs,
                storage.clone(),
            )?;
            info!("Proof API endpoint: {}", source.endpoint());
            spawn_drivers(&mut drivers, &config, source, &shutdown_rx);
        }
        Backend::Store => {
            let source = StoreSource::new(storage.clone());
            spawn_drivers(&mut drivers, &config, source, &shutdown_rx);
        }
    }

    info!(
        "Verifier is running with {} chain(s). Press Ctrl+C to stop.",
        drivers.len()
    );

    let chain_count = drivers.len();
    let mut failed = 0;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Received shutdown signal, gracefully shutting down...");
                break;
            }
            joined = drivers.join_next() => {
                match joined {
                    Some(result) => {
                        if !log_driver_exit(result) {
                            failed += 1;
                        }
                    }
                    None => {
                        warn!("All chain drivers exited");
                        break;
                    }
                }
            }
        }
    }

    // Receivers may all be gone already.
    let _ = shutdown_tx.send(true);
    while let Some(result) = drivers.join_next().await {
        if !log_driver_exit(result) {
            failed += 1;
        }
    }

    storage.close().await;

    if chain_count > 0 && failed == chain_count {
        anyhow::bail!("All {} chain drivers failed", chain_count);
    }

    Ok(())
}

fn spawn_drivers<S>(
    drivers: &mut JoinSet<(u32, Result<()>)>,
    config: &Config,
    source: S,
    shutdown: &watch::Receiver<bool>,
) where
    S: DataSource + Clone + 'static,
{
    for chain in &config.chains {
        let driver = ChainDriver::new(
            *chain,
            source.clone(),
            ProofVerifier::new(Bn254Verifier, config.verifier.curve),
            config.polling,
        );
        let chain_id = chain.chain_id;
        let shutdown = shutdown.clone();
        drivers.spawn(async move { (chain_id, driver.run(shutdown).await) });
    }
}

/// Log how a driver task ended. Returns false if it failed.
fn log_driver_exit(result: Result<(u32, Result<()>), tokio::task::JoinError>) -> bool {
    match result {
        Ok((chain_id, Ok(()))) => {
            info!("Chain {} driver exited", chain_id);
            true
        }
        Ok((chain_id, Err(e))) => {
            error!("Chain {} driver failed: {:#}", chain_id, e);
            false
        }
        Err(e) => {
            error!("Chain driver task panicked: {}", e);
            false
        }
    }
}

fn read_proof(path: &Path) -> Result<StateProof> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read proof file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to decode state proof: {}", path.display()))
}

/// Verify one proof file and print the verdict
fn verify_proof_file(proof: &Path, previous: Option<&Path>, curve: BlsCurve) -> Result<()> {
    if !Bn254Verifier::supports(curve) {
        anyhow::bail!("No signature verifier for curve '{}'", curve);
    }

    let proof = read_proof(proof)?;
    let previous = previous.map(read_proof).transpose()?;

    let verifier = ProofVerifier::new(Bn254Verifier, curve);
    let verdict = verifier.verify(&proof, previous.as_ref().map(|p| p.committee_header()));

    let header = proof.committee_header();
    println!("\n=== State Proof ===\n");
    println!("  Chain ID: {}", proof.chain_id());
    println!("  Batch Number: {}", proof.batch_number());
    println!("  Committee Root: {}", header.current_committee_root);
    println!("  Next Committee Root: {}", header.next_committee_root);
    println!(
        "  Signers: {} of {} operators",
        proof.signer_count(),
        proof.roster().len()
    );
    println!(
        "  Continuity: {}",
        if previous.is_some() {
            "checked against previous batch"
        } else {
            "not checked"
        }
    );
    println!("\nVerdict: {}\n", verdict);

    if verdict.is_failure() {
        anyhow::bail!(
            "Batch {} of chain {} failed verification ({})",
            proof.batch_number(),
            proof.chain_id(),
            verdict.kind()
        );
    }

    Ok(())
}

/// Show checkpoints and failed batches
async fn show_status(config_path: &str) -> Result<()> {
    info!("Checking verifier status");

    // Fall back to the default database ONLY if the config file doesn't exist
    let (database_url, max_conn, min_conn, chains) = match Config::from_file(config_path) {
        Ok(config) => {
            info!("Using database from config: {}", config.database.url);
            let chains: Vec<u32> = config.chains.iter().map(|c| c.chain_id).collect();
            (
                config.database.url,
                Some(config.database.max_connections),
                Some(config.database.min_connections),
                Some(chains),
            )
        }
        Err(e) => {
            let is_not_found = e.chain().any(|cause| {
                cause
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
            });

            if is_not_found {
                info!(
                    "Config file not found, using default database: {}",
                    DEFAULT_DATABASE_URL
                );
                (DEFAULT_DATABASE_URL.to_string(), None, None, None)
            } else {
                return Err(e).context("Failed to load config file");
            }
        }
    };

    let storage = Storage::new(&database_url, max_conn, min_conn)
        .await
        .context("Failed to connect to database")?;

    // Handles a fresh database
    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    let chains = match chains {
        Some(chains) => chains,
        None => storage.known_chains().await?,
    };

    println!("\n=== State Verifier Status ===\n");

    if chains.is_empty() {
        println!("No chains recorded yet.");
    }

    for chain_id in chains {
        let progress = storage.chain_progress(chain_id).await?;
        println!("Chain {}:", chain_id);
        match progress.checkpoint {
            Some(batch) => println!("  Last Processed Batch: {}", batch),
            None => println!("  Last Processed Batch: none"),
        }
        println!("  Failed Batches: {}", progress.failed_count);

        let failed = storage.get_failed_batches(chain_id).await?;
        for entry in failed.iter().rev().take(5) {
            println!(
                "    batch {} ({}) at {}",
                entry.batch_number,
                entry.reason,
                chrono::DateTime::from_timestamp(entry.recorded_at, 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
        println!();
    }

    storage.close().await;

    Ok(())
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url, None, None)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    info!("Database initialized successfully!");

    storage.close().await;

    Ok(())
}
