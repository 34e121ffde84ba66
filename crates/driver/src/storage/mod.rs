//! Storage layer for the state proof verifier.
//!
//! This module provides database operations for:
//! - Progress ledger (checkpoints and failed batches)
//! - Batches and committee rosters served by the store backend

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod batches;
pub mod progress;

pub use batches::BatchRecord;
pub use progress::{ChainProgress, FailedBatch};

/// Database storage for the verifier.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Call
    /// [`Storage::run_migrations`] before use.
    ///
    /// # Arguments
    /// * `database_url` - SQLite database URL (e.g., "sqlite://state-verifier.db")
    /// * `max_connections` - Pool ceiling (default 5)
    /// * `min_connections` - Connections kept open (default 1)
    ///
    /// # Example
    /// ```no_run
    /// # use lsc_driver::storage::Storage;
    /// # async fn example() -> anyhow::Result<()> {
    /// let storage = Storage::new("sqlite://state-verifier.db", None, None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        database_url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .min_connections(min_connections.unwrap_or(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url, None, None).await
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}

/// SQLite integer column value of a batch number.
pub(crate) fn batch_to_db(batch_number: u64) -> Result<i64> {
    i64::try_from(batch_number)
        .with_context(|| format!("Batch number {} does not fit the database", batch_number))
}

/// Batch number stored in a SQLite integer column.
pub(crate) fn batch_from_db(value: i64) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("Negative batch number {} in database", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_storage_creation() {
        let _temp_db = NamedTempFile::new().unwrap();
        let db_path = _temp_db.path();

        let storage = Storage::new_with_path(db_path).await.unwrap();
        storage.run_migrations().await.unwrap();

        storage.health_check().await.unwrap();

        storage.close().await;
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let _temp_db = NamedTempFile::new().unwrap();

        let storage = Storage::new_with_path(_temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        storage.run_migrations().await.unwrap();

        storage.close().await;
    }

    #[test]
    fn test_batch_number_conversion_is_checked() {
        assert_eq!(batch_to_db(32840).unwrap(), 32840);
        assert_eq!(batch_to_db(i64::MAX as u64).unwrap(), i64::MAX);
        assert!(batch_to_db(u64::MAX).is_err());
        assert!(batch_to_db(i64::MAX as u64 + 1).is_err());

        assert_eq!(batch_from_db(7).unwrap(), 7);
        assert!(batch_from_db(-1).is_err());
    }
}
