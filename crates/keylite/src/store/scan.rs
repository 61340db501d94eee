//! Lazy paginated scans over the cache table.
//!
//! A scan walks every live row whose key matches a namespace prefix,
//! fetching one bounded page at a time with an explicit offset cursor. The
//! expiry cutoff is snapshotted once when the scan is created, so a single
//! timestamp governs the whole walk regardless of how long the consumer
//! takes between entries.

use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tokio_rusqlite::{Connection, params};

use super::connection::CacheStore;
use super::{key_pattern, now_ms};
use crate::error::Error;

impl CacheStore {
    /// Start a scan over `namespace` (or the whole table).
    ///
    /// Each call begins a fresh scan at offset zero; scans are forward-only
    /// and not restartable. Pages are fetched only as the consumer
    /// advances, so abandoning a scan early reads nothing further.
    pub fn iter<T>(&self, namespace: Option<&str>) -> Scan<T> {
        Scan {
            conn: self.conn.clone(),
            sql: self.sql.scan_page.clone(),
            pattern: key_pattern(namespace),
            cutoff: now_ms(),
            limit: self.iteration_limit,
            offset: 0,
            page: VecDeque::new(),
            done: false,
            _value: PhantomData,
        }
    }
}

/// In-progress lazy scan yielding `(key, value)` pairs.
pub struct Scan<T> {
    conn: Connection,
    sql: String,
    pattern: String,
    cutoff: i64,
    limit: u32,
    offset: i64,
    page: VecDeque<(String, String)>,
    done: bool,
    _value: PhantomData<T>,
}

impl<T: DeserializeOwned> Scan<T> {
    /// Advance to the next entry, fetching a new page when the buffered one
    /// is exhausted. Returns `Ok(None)` once the scan is complete.
    pub async fn next_entry(&mut self) -> Result<Option<(String, T)>, Error> {
        if self.page.is_empty() && !self.done {
            self.fetch_page().await?;
        }
        match self.page.pop_front() {
            Some((key, data)) => Ok(Some((key, serde_json::from_str(&data)?))),
            None => Ok(None),
        }
    }

    /// Fetch the next page and advance the cursor by the rows it returned.
    /// An empty page ends the scan.
    async fn fetch_page(&mut self) -> Result<(), Error> {
        let sql = self.sql.clone();
        let pattern = self.pattern.clone();
        let cutoff = self.cutoff;
        let limit = self.limit;
        let offset = self.offset;

        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                let fetched = stmt
                    .query_map(params![pattern, cutoff, limit, offset], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(fetched)
            })
            .await
            .map_err(Error::from)?;

        if rows.is_empty() {
            self.done = true;
        } else {
            self.offset += rows.len() as i64;
            self.page.extend(rows);
        }
        Ok(())
    }
}
