//! SQL text for the cache table, rendered once per store.
//!
//! Every query the store issues is formatted against the validated table
//! name at construction and reused for the lifetime of the store. The
//! strings go through rusqlite's prepared-statement cache on execution, so
//! each one is compiled once per connection and reused across calls.

/// The store's statement set, plus the schema bootstrap batch.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub schema: String,
    pub select_one: String,
    pub select_batch: String,
    pub upsert: String,
    pub delete_one: String,
    pub delete_batch: String,
    pub clear_prefix: String,
    pub scan_page: String,
    pub purge_expired: String,
    pub exists: String,
}

impl Statements {
    /// Render the full statement set for `table`.
    ///
    /// `table` must already be validated as a bare identifier; it is spliced
    /// into the SQL text verbatim.
    pub fn render(table: &str) -> Self {
        Self {
            schema: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
    'cacheKey' TEXT PRIMARY KEY,
    'cacheData' TEXT,
    'createdAt' INTEGER,
    'expiredAt' INTEGER
);
CREATE INDEX IF NOT EXISTS idx_expired_{table} ON {table}(expiredAt);"
            ),
            select_one: format!(
                "SELECT cacheKey, cacheData, expiredAt FROM {table} WHERE cacheKey = ?1"
            ),
            select_batch: format!(
                "SELECT cacheKey, cacheData, expiredAt FROM {table} \
                 WHERE cacheKey IN (SELECT value FROM json_each(?1))"
            ),
            upsert: format!(
                "INSERT INTO {table} (cacheKey, cacheData, createdAt, expiredAt) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(cacheKey) DO UPDATE SET \
                     cacheData = excluded.cacheData, \
                     createdAt = excluded.createdAt, \
                     expiredAt = excluded.expiredAt"
            ),
            delete_one: format!("DELETE FROM {table} WHERE cacheKey = ?1"),
            delete_batch: format!(
                "DELETE FROM {table} WHERE cacheKey IN (SELECT value FROM json_each(?1))"
            ),
            clear_prefix: format!("DELETE FROM {table} WHERE cacheKey LIKE ?1"),
            scan_page: format!(
                "SELECT cacheKey, cacheData FROM {table} \
                 WHERE cacheKey LIKE ?1 AND (expiredAt = -1 OR expiredAt > ?2) \
                 ORDER BY cacheKey LIMIT ?3 OFFSET ?4"
            ),
            purge_expired: format!(
                "DELETE FROM {table} WHERE expiredAt != -1 AND expiredAt < ?1"
            ),
            exists: format!(
                "SELECT EXISTS(SELECT 1 FROM {table} \
                 WHERE cacheKey = ?1 AND (expiredAt = -1 OR expiredAt > ?2))"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_targets_table() {
        let sql = Statements::render("session_cache");
        assert!(sql.select_one.contains("FROM session_cache "));
        assert!(sql.upsert.contains("INSERT INTO session_cache "));
        assert!(sql.schema.contains("CREATE TABLE IF NOT EXISTS session_cache"));
    }

    #[test]
    fn test_default_table_index_name() {
        // Files written by older deployments already carry an index of this
        // name on the default table; rendering the same name keeps reopen
        // from adding a duplicate.
        let sql = Statements::render("caches");
        assert!(sql.schema.contains("idx_expired_caches"));
    }
}
