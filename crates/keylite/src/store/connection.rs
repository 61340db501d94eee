//! Store handle and connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying the configured
//! pragmas (lock-wait budget, optional WAL mode), and ensuring the cache
//! table and its expiry index exist.

use tokio_rusqlite::Connection;

use super::statements::Statements;
use crate::config::StoreConfig;
use crate::error::Error;

/// Cache table store.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread, plus the SQL statement set rendered for the
/// configured table. Cloning is cheap and shares the same connection.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pub(crate) conn: Connection,
    pub(crate) sql: Statements,
    pub(crate) iteration_limit: u32,
}

impl CacheStore {
    /// Open the database named by `config`.
    ///
    /// Creates the file if it doesn't exist, applies `PRAGMA busy_timeout`
    /// (and `PRAGMA journal_mode = WAL` when requested), and idempotently
    /// creates the cache table and its `expiredAt` index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] before touching the filesystem when
    /// `config` is invalid, [`Error::Storage`] when the database cannot be
    /// opened or prepared.
    pub async fn open(config: StoreConfig) -> Result<Self, Error> {
        config.validate()?;

        let conn = if config.is_in_memory() {
            Connection::open_in_memory().await
        } else {
            Connection::open(config.require_uri()?).await
        }
        .map_err(|e| Error::Storage(e.into()))?;

        let busy_timeout = config.busy_timeout;
        let enable_wal = config.enable_wal_mode;
        let sql = Statements::render(&config.table);
        let schema = sql.schema.clone();

        conn.call(move |conn| -> Result<(), Error> {
            conn.execute_batch(&format!("PRAGMA busy_timeout = {busy_timeout};"))?;
            if enable_wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(&schema)?;
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        tracing::debug!(table = %config.table, "cache store ready");

        Ok(Self { conn, sql, iteration_limit: config.iteration_limit })
    }

    /// Open a non-persisted in-memory store with default settings.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::open(StoreConfig::in_memory()).await
    }

    /// Whether stored entries can carry a time-to-live. Always true.
    pub fn ttl_support(&self) -> bool {
        true
    }

    /// Close the underlying database handle.
    ///
    /// Every operation issued afterwards (on this store or any clone of it)
    /// fails with [`Error::ConnectionClosed`] rather than reporting entries
    /// as absent.
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.conn.clone().close().await.map_err(Error::from)
    }
}
