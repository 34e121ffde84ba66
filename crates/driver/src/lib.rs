//! # LSC Driver
//!
//! Runs committee state proof verification against live data sources.
//!
//! This crate provides:
//! - Per-chain verification drivers with checkpointing and a failed-batch ledger
//! - HTTP API and SQLite store backends behind one [`source::DataSource`] trait
//! - TOML configuration with environment overrides
//! - SQLite storage for progress and store-backend proofs

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod source;
pub mod storage;

pub use config::Config;
pub use driver::{ChainDriver, Outcome};
pub use source::{ApiSource, DataSource, FetchError, StoreSource};
pub use storage::Storage;
