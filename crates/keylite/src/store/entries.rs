//! Cache row CRUD operations.
//!
//! Reads that encounter logically-expired rows hide them from the caller
//! and hand their physical deletion to a background task, so the read path
//! never waits on, or fails because of, the purge.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheStore;
use super::{NEVER_EXPIRES, key_pattern, now_ms};
use crate::error::Error;

/// Key count at which fetch and delete switch from per-key statements to a
/// single membership query over a serialized key list. Both paths return
/// identical results.
const BATCH_THRESHOLD: usize = 3;

/// One persisted row, minus `createdAt`, which is never consulted after a
/// write.
#[derive(Debug, Clone)]
struct CacheRow {
    key: String,
    data: String,
    expired_at: i64,
}

impl CacheRow {
    fn is_expired(&self, now: i64) -> bool {
        self.expired_at != NEVER_EXPIRES && self.expired_at < now
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheRow> {
    Ok(CacheRow { key: row.get(0)?, data: row.get(1)?, expired_at: row.get(2)? })
}

impl CacheStore {
    /// Get the live value stored under `key`, or `None` when the key is
    /// missing or its TTL has passed.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let rows = self.fetch_rows(vec![key.to_string()]).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_str(&row.data)?)),
            None => Ok(None),
        }
    }

    /// Get many keys at once.
    ///
    /// The result has the same length and order as `keys`, with `None` in
    /// the positions of missing or expired keys.
    pub async fn get_many<T, K>(&self, keys: &[K]) -> Result<Vec<Option<T>>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let owned: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let rows = self.fetch_rows(owned).await?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            match rows.iter().find(|row| row.key == key.as_ref()) {
                Some(row) => values.push(Some(serde_json::from_str(&row.data)?)),
                None => values.push(None),
            }
        }
        Ok(values)
    }

    /// Store `value` under `key`, fully replacing any existing row.
    ///
    /// A positive `ttl_seconds` schedules expiry that many seconds from
    /// now; `None` or zero stores the row without an expiry.
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        self.write_rows(vec![(key.to_string(), payload)], ttl_seconds).await
    }

    /// Store many entries with one shared TTL, as a loop of single-row
    /// upserts submitted together.
    pub async fn set_many<K, T>(&self, entries: &[(K, T)], ttl_seconds: Option<u64>) -> Result<(), Error>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let mut rows = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            rows.push((key.as_ref().to_string(), serde_json::to_string(value)?));
        }
        self.write_rows(rows, ttl_seconds).await
    }

    /// Remove `key`. Returns true iff exactly one row was removed.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let removed = self.delete_rows(vec![key.to_string()]).await?;
        Ok(removed == 1)
    }

    /// Remove many keys. Returns true iff every key was present and
    /// removed.
    pub async fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<bool, Error> {
        let owned: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let expected = owned.len();
        let removed = self.delete_rows(owned).await?;
        Ok(removed == expected)
    }

    /// Remove every row in `namespace`, or every row in the table when no
    /// namespace is given. Succeeds on an empty table.
    pub async fn clear(&self, namespace: Option<&str>) -> Result<(), Error> {
        let pattern = key_pattern(namespace);
        let sql = self.sql.clear_prefix.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.execute(params![pattern])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a live (non-expired) row exists under `key`.
    pub async fn has(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        let ts = now_ms();
        let sql = self.sql.exists.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt.query_row(params![key, ts], |row| row.get(0))?)
            })
            .await
            .map_err(Error::from)
    }

    /// Physically delete every expired row right now.
    ///
    /// Returns the number of rows removed. Reads already hide expired rows;
    /// this reclaims their space without waiting for a read to trigger the
    /// background purge.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let ts = now_ms();
        let sql = self.sql.purge_expired.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt.execute(params![ts])? as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Fetch the live rows for `keys`, in no particular order.
    ///
    /// Expired rows are filtered out here and scheduled for background
    /// deletion using this read's timestamp.
    async fn fetch_rows(&self, keys: Vec<String>) -> Result<Vec<CacheRow>, Error> {
        let ts = now_ms();
        let sql_one = self.sql.select_one.clone();
        let sql_batch = self.sql.select_batch.clone();

        let (rows, saw_expired) = self
            .conn
            .call(move |conn| -> Result<(Vec<CacheRow>, bool), Error> {
                let mut rows = Vec::with_capacity(keys.len());
                let mut saw_expired = false;

                if keys.len() >= BATCH_THRESHOLD {
                    let list = serde_json::to_string(&keys)?;
                    let mut stmt = conn.prepare_cached(&sql_batch)?;
                    for fetched in stmt.query_map(params![list], map_row)? {
                        let row = fetched?;
                        if row.is_expired(ts) {
                            saw_expired = true;
                        } else {
                            rows.push(row);
                        }
                    }
                } else {
                    let mut stmt = conn.prepare_cached(&sql_one)?;
                    for key in &keys {
                        match stmt.query_row(params![key], map_row) {
                            Ok(row) if row.is_expired(ts) => saw_expired = true,
                            Ok(row) => rows.push(row),
                            Err(rusqlite::Error::QueryReturnedNoRows) => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                }

                Ok((rows, saw_expired))
            })
            .await
            .map_err(Error::from)?;

        if saw_expired {
            self.schedule_purge(ts);
        }
        Ok(rows)
    }

    async fn write_rows(&self, rows: Vec<(String, String)>, ttl_seconds: Option<u64>) -> Result<(), Error> {
        let created_at = now_ms();
        let expired_at = match ttl_seconds {
            Some(ttl) if ttl > 0 => created_at + (ttl as i64) * 1000,
            _ => NEVER_EXPIRES,
        };
        let sql = self.sql.upsert.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                for (key, data) in &rows {
                    stmt.execute(params![key, data, created_at, expired_at])?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_rows(&self, keys: Vec<String>) -> Result<usize, Error> {
        let sql_one = self.sql.delete_one.clone();
        let sql_batch = self.sql.delete_batch.clone();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                if keys.len() >= BATCH_THRESHOLD {
                    let list = serde_json::to_string(&keys)?;
                    let mut stmt = conn.prepare_cached(&sql_batch)?;
                    Ok(stmt.execute(params![list])?)
                } else {
                    let mut stmt = conn.prepare_cached(&sql_one)?;
                    let mut changes = 0;
                    for key in &keys {
                        changes += stmt.execute(params![key])?;
                    }
                    Ok(changes)
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Queue physical deletion of rows that expired at or before `cutoff`.
    ///
    /// Runs after the triggering read returns; failures are logged and never
    /// reach the reader.
    fn schedule_purge(&self, cutoff: i64) {
        let conn = self.conn.clone();
        let sql = self.sql.purge_expired.clone();
        tokio::spawn(async move {
            let purged = conn
                .call(move |conn| -> Result<usize, Error> {
                    let mut stmt = conn.prepare_cached(&sql)?;
                    Ok(stmt.execute(params![cutoff])?)
                })
                .await
                .map_err(Error::from);
            match purged {
                Ok(n) if n > 0 => tracing::debug!(purged = n, "removed expired cache rows"),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "failed to purge expired cache rows"),
            }
        });
    }
}
