//! Namespace-scoping facade over the cache table store.
//!
//! The store itself is namespace-agnostic; partitioning is a key-prefix
//! convention. [`Keylite`] applies that convention: it prefixes keys with
//! `"<namespace>:"` on the way in, scopes `clear` and iteration to the
//! namespace, and strips the prefix from iterated keys on the way out.
//! Several facades with distinct namespaces can share one database file
//! without observing each other's entries.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::StoreConfig;
use crate::error::Error;
use crate::store::{CacheStore, Scan};

/// A cache handle: a store plus an optional namespace.
#[derive(Clone, Debug)]
pub struct Keylite {
    store: CacheStore,
    namespace: Option<String>,
}

impl Keylite {
    /// Open a ready-to-use cache backed by a fresh store for `config`.
    pub async fn open(config: StoreConfig) -> Result<Self, Error> {
        Ok(Self::new(CacheStore::open(config).await?))
    }

    /// Wrap an existing store.
    pub fn new(store: CacheStore) -> Self {
        Self { store, namespace: None }
    }

    /// Scope this handle to `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Change or drop the namespace on an existing handle.
    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Whether entries can carry a time-to-live. Always true.
    pub fn ttl_support(&self) -> bool {
        self.store.ttl_support()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.store.get(&self.prefixed(key)).await
    }

    pub async fn get_many<T, K>(&self, keys: &[K]) -> Result<Vec<Option<T>>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed(k.as_ref())).collect();
        self.store.get_many(&prefixed).await
    }

    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        self.store.set(&self.prefixed(key), value, ttl_seconds).await
    }

    pub async fn set_many<K, T>(&self, entries: &[(K, T)], ttl_seconds: Option<u64>) -> Result<(), Error>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let prefixed: Vec<(String, &T)> =
            entries.iter().map(|(k, v)| (self.prefixed(k.as_ref()), v)).collect();
        self.store.set_many(&prefixed, ttl_seconds).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.store.delete(&self.prefixed(key)).await
    }

    pub async fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<bool, Error> {
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed(k.as_ref())).collect();
        self.store.delete_many(&prefixed).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, Error> {
        self.store.has(&self.prefixed(key)).await
    }

    /// Remove every entry in this handle's namespace, or the whole table
    /// when no namespace is set.
    pub async fn clear(&self) -> Result<(), Error> {
        self.store.clear(self.namespace()).await
    }

    /// Scan this handle's namespace lazily, yielding keys without their
    /// namespace prefix.
    pub fn iter<T>(&self) -> CacheIter<T> {
        CacheIter {
            inner: self.store.iter(self.namespace()),
            prefix: self.namespace.as_ref().map(|ns| format!("{ns}:")),
        }
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        self.store.disconnect().await
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }
}

/// Scan over a facade's namespace, yielding unprefixed keys.
pub struct CacheIter<T> {
    inner: Scan<T>,
    prefix: Option<String>,
}

impl<T: DeserializeOwned> CacheIter<T> {
    /// Advance to the next entry. Returns `Ok(None)` once complete.
    pub async fn next_entry(&mut self) -> Result<Option<(String, T)>, Error> {
        match self.inner.next_entry().await? {
            Some((key, value)) => {
                let key = match &self.prefix {
                    Some(prefix) => key.strip_prefix(prefix.as_str()).unwrap_or(&key).to_string(),
                    None => key,
                };
                Ok(Some((key, value)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut iter: CacheIter<String>) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        while let Some(entry) = iter.next_entry().await.unwrap() {
            entries.push(entry);
        }
        entries
    }

    #[tokio::test]
    async fn test_open_produces_working_cache() {
        let cache = Keylite::open(StoreConfig::in_memory()).await.unwrap();
        assert!(cache.ttl_support());

        cache.set("foo", "bar", None).await.unwrap();
        assert_eq!(cache.get::<String>("foo").await.unwrap().as_deref(), Some("bar"));
    }

    #[tokio::test]
    async fn test_namespace_prefixes_keys() {
        let cache = Keylite::open(StoreConfig::in_memory()).await.unwrap().with_namespace("ns1");
        cache.set("a", "x", None).await.unwrap();

        // The raw store sees the prefixed key, the facade the bare one.
        assert_eq!(cache.store().get::<String>("ns1:a").await.unwrap().as_deref(), Some("x"));
        assert_eq!(cache.get::<String>("a").await.unwrap().as_deref(), Some("x"));
        assert!(cache.store().get::<String>("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespace_isolation_over_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().join("cache.sqlite3").display().to_string();

        let cache_a = Keylite::open(StoreConfig::new(uri.as_str())).await.unwrap().with_namespace("ns1");
        let cache_b = Keylite::open(StoreConfig::new(uri.as_str())).await.unwrap().with_namespace("ns2");

        cache_a.set_many(&[("a", "x"), ("b", "y"), ("c", "z")], None).await.unwrap();
        cache_b.set_many(&[("a", "one"), ("b", "two"), ("c", "three")], None).await.unwrap();

        let values_a = cache_a.get_many::<String, _>(&["a", "b", "c"]).await.unwrap();
        let values_b = cache_b.get_many::<String, _>(&["a", "b", "c"]).await.unwrap();
        assert_eq!(
            values_a,
            vec![Some("x".to_string()), Some("y".to_string()), Some("z".to_string())]
        );
        assert_eq!(
            values_b,
            vec![Some("one".to_string()), Some("two".to_string()), Some("three".to_string())]
        );

        let entries_a = drain(cache_a.iter::<String>()).await;
        assert_eq!(
            entries_a,
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string()),
                ("c".to_string(), "z".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_scoped_to_namespace() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let cache_a = Keylite::new(store.clone()).with_namespace("ns1");
        let cache_b = Keylite::new(store).with_namespace("ns2");

        cache_a.set("a", "x", None).await.unwrap();
        cache_b.set("a", "one", None).await.unwrap();

        cache_a.clear().await.unwrap();
        assert!(cache_a.get::<String>("a").await.unwrap().is_none());
        assert_eq!(cache_b.get::<String>("a").await.unwrap().as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_delete_many_within_namespace() {
        let cache = Keylite::open(StoreConfig::in_memory()).await.unwrap().with_namespace("ns");
        cache.set_many(&[("a", 1), ("b", 2), ("c", 3)], None).await.unwrap();

        assert!(cache.delete_many(&["a", "b", "c"]).await.unwrap());
        let values = cache.get_many::<i64, _>(&["a", "b", "c"]).await.unwrap();
        assert_eq!(values, vec![None, None, None]);
    }

    #[tokio::test]
    async fn test_iter_without_namespace_keeps_keys() {
        let cache = Keylite::open(StoreConfig::in_memory()).await.unwrap();
        cache.set("foo", "bar", None).await.unwrap();

        let entries = drain(cache.iter::<String>()).await;
        assert_eq!(entries, vec![("foo".to_string(), "bar".to_string())]);
    }

    #[tokio::test]
    async fn test_disconnect_propagates() {
        let cache = Keylite::open(StoreConfig::in_memory()).await.unwrap();
        cache.disconnect().await.unwrap();
        assert!(matches!(cache.get::<String>("foo").await, Err(Error::ConnectionClosed)));
    }
}
