use std::collections::HashMap;
use std::fmt::Display;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::cache::{Cache, CacheError};

/// Process-local backend. Entries live exactly as long as the instance,
/// which makes it the innermost layer for tests and single-node setups.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryCache")
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::contract;

    #[tokio::test]
    async fn contract() {
        contract::exercise(&MemoryCache::new()).await;
    }

    #[tokio::test]
    async fn put_overwrites() {
        let cache = MemoryCache::new();
        cache.put("example.com", b"old").await.unwrap();
        cache.put("example.com", b"new").await.unwrap();
        assert_eq!(cache.get("example.com").await.unwrap().as_deref(), Some(&b"new"[..]));
    }
}
