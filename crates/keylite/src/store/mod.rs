//! SQLite-backed cache table store.
//!
//! This module owns one table in an embedded SQLite database (or an
//! in-memory database) and performs all reads and writes against it. It
//! supports:
//!
//! - Batch-oriented fetch/upsert/delete with an input-order contract
//! - Per-row TTLs with lazy, off-read-path purging of expired rows
//! - Cursor-style paginated scans scoped to a key-prefix namespace
//! - Concurrent access to one file from multiple stores via a lock-wait
//!   budget, with optional WAL journaling

pub mod connection;
pub mod scan;

mod entries;
pub(crate) mod statements;

pub use connection::CacheStore;
pub use scan::Scan;

/// `expiredAt` sentinel for rows that never expire.
pub(crate) const NEVER_EXPIRES: i64 = -1;

/// Current wall-clock time in epoch milliseconds, the unit `createdAt` and
/// `expiredAt` are stored in.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// LIKE pattern selecting a namespace's keys, or every key when no
/// namespace is given.
pub(crate) fn key_pattern(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("{ns}:%"),
        None => "%".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pattern_scoped() {
        assert_eq!(key_pattern(Some("sessions")), "sessions:%");
    }

    #[test]
    fn test_key_pattern_unscoped() {
        assert_eq!(key_pattern(None), "%");
    }
}
