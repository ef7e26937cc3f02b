//! Result cache.

use dealername_model::NameResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Trait for result caches (in-memory, external key-value stores, ...)
///
/// Best effort: callers treat every error as a miss.
pub trait NameCache {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<NameResult>, CacheError>> + Send;

    fn set(
        &self,
        key: &str,
        value: &NameResult,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Process-local cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (NameResult, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (NameResult, Instant)>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))
    }
}

impl NameCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<NameResult>, CacheError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &NameResult, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), (value.clone(), Instant::now() + ttl));
        Ok(())
    }
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl NameCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<NameResult>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &NameResult, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        let value = NameResult::new("napleshonda.com", "Naples Honda", 100);

        cache.set("k", &value, Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(value));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_no_cache_always_misses() {
        let value = NameResult::new("a.com", "A", 90);
        NoCache.set("k", &value, Duration::from_secs(60)).await.unwrap();
        assert_eq!(NoCache.get("k").await.unwrap(), None);
    }
}
