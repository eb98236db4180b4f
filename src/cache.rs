//! A concrete, name-keyed cache with pluggable secondary indexes. Population
//! from the live API server is the surrounding platform's job; this module
//! only provides the shape resolvers are written against, plus the
//! subject-indexer installation contract the rule resolvers rely on.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum Error {
    #[error("index {0:?} was already installed on this cache")]
    DuplicateIndexer(String),
}

type Indexer<T> = Box<dyn Fn(&T) -> Vec<String> + Send + Sync>;

struct Inner<T> {
    by_name: HashMap<String, Arc<T>>,
    indexes: HashMap<String, HashMap<String, Vec<Arc<T>>>>,
    indexers: HashMap<String, Indexer<T>>,
}

/// An in-process, name-keyed cache with named secondary indexes. Each index
/// must be registered exactly once (`add_indexer` returns
/// `Error::DuplicateIndexer` otherwise) — installing the same index twice on
/// a live cache is a programmer error.
pub struct Cache<T> {
    inner: RwLock<Inner<T>>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_name: HashMap::new(),
                indexes: HashMap::new(),
                indexers: HashMap::new(),
            }),
        }
    }
}

impl<T> Cache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named indexer. `f` maps a stored object to zero or more
    /// index keys it should be reachable under (a binding typically
    /// contributes one key, for its single populated subject).
    pub async fn add_indexer(
        &self,
        name: &str,
        f: impl Fn(&T) -> Vec<String> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        if inner.indexers.contains_key(name) {
            return Err(Error::DuplicateIndexer(name.to_string()));
        }
        inner.indexers.insert(name.to_string(), Box::new(f));
        inner.indexes.insert(name.to_string(), HashMap::new());
        Ok(())
    }

    /// Inserts or replaces an object, keyed by name, refreshing every
    /// registered index's entries for it.
    pub async fn put(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        let value = Arc::new(value);
        let mut inner = self.inner.write().await;
        let old = inner.by_name.insert(name.clone(), value.clone());

        let index_names: Vec<String> = inner.indexers.keys().cloned().collect();
        for index_name in index_names {
            // Drop the previous revision of this object (if any) from every
            // bucket, then re-insert under the freshly computed keys.
            if let Some(old) = &old {
                if let Some(buckets) = inner.indexes.get_mut(&index_name) {
                    for bucket in buckets.values_mut() {
                        bucket.retain(|v| !Arc::ptr_eq(v, old));
                    }
                }
            }
            let keys = {
                let indexer = inner.indexers.get(&index_name).expect("just checked");
                indexer(&value)
            };
            let buckets = inner.indexes.get_mut(&index_name).expect("just inserted");
            for key in keys {
                buckets.entry(key).or_default().push(value.clone());
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<T>> {
        self.inner.read().await.by_name.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if let Some(value) = inner.by_name.remove(name) {
            for buckets in inner.indexes.values_mut() {
                for bucket in buckets.values_mut() {
                    bucket.retain(|v| !Arc::ptr_eq(v, &value));
                }
            }
        }
    }

    /// Looks up every object indexed under `key` for the named index.
    /// Returns an empty vec for an unknown index or key — mirroring how a
    /// real informer index behaves on a miss (never an error).
    pub async fn by_index(&self, index_name: &str, key: &str) -> Vec<Arc<T>> {
        self.inner
            .read()
            .await
            .indexes
            .get(index_name)
            .and_then(|buckets| buckets.get(key))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn list(&self) -> Vec<Arc<T>> {
        self.inner.read().await.by_name.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let cache: Cache<String> = Cache::new();
        cache.put("a", "hello".to_string()).await;
        assert_eq!(cache.get("a").await.as_deref(), Some(&"hello".to_string()));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_indexer_install_is_rejected() {
        let cache: Cache<String> = Cache::new();
        cache.add_indexer("by_len", |v: &String| vec![v.len().to_string()]).await.unwrap();
        let err = cache
            .add_indexer("by_len", |v: &String| vec![v.len().to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIndexer(name) if name == "by_len"));
    }

    #[tokio::test]
    async fn index_lookup_reflects_inserted_values() {
        let cache: Cache<String> = Cache::new();
        cache
            .add_indexer("by_first_char", |v: &String| {
                v.chars().next().map(|c| c.to_string()).into_iter().collect()
            })
            .await
            .unwrap();
        cache.put("k1", "apple".to_string()).await;
        cache.put("k2", "avocado".to_string()).await;
        cache.put("k3", "banana".to_string()).await;

        let a = cache.by_index("by_first_char", "a").await;
        assert_eq!(a.len(), 2);
        let b = cache.by_index("by_first_char", "b").await;
        assert_eq!(b.len(), 1);
        assert!(cache.by_index("by_first_char", "z").await.is_empty());
    }

    #[tokio::test]
    async fn remove_clears_indexes() {
        let cache: Cache<String> = Cache::new();
        cache
            .add_indexer("by_first_char", |v: &String| {
                vec![v.chars().next().unwrap().to_string()]
            })
            .await
            .unwrap();
        cache.put("k1", "apple".to_string()).await;
        cache.remove("k1").await;
        assert!(cache.by_index("by_first_char", "a").await.is_empty());
        assert!(cache.get("k1").await.is_none());
    }
}
