// src/stores/kv.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool>;

    async fn delete(&self, key: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Expired entries are swept on write at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Option<Instant>,
}

impl Entries {
    fn insert(&mut self, key: &str, value: String, expires_at: Instant, now: Instant) {
        if self
            .last_sweep
            .is_none_or(|at| now.duration_since(at) >= SWEEP_INTERVAL)
        {
            self.map.retain(|_, e| e.expires_at > now);
            self.last_sweep = Some(now);
        }
        self.map.insert(key.to_string(), Entry { value, expires_at });
    }
}

/// In-process store with per-key expiry on tokio's clock, so paused-time
/// tests can advance past a TTL.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<Entries>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut entries = self.lock()?;
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let now = Instant::now();
        self.lock()?.insert(key, value, now + ttl, now);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        if entries.map.get(key).is_some_and(|e| e.expires_at > now) {
            return Ok(false);
        }
        entries.insert(key, value, now + ttl, now);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.lock()?.map.remove(key);
        Ok(())
    }
}

/// JSON codec and timeout bound over a `KeyValueStore`.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl CacheClient {
    pub fn new(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let raw = tokio::time::timeout(self.timeout, self.store.get(key)).await??;
        raw.map(|s| serde_json::from_str(&s).map_err(AppError::from))
            .transpose()
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        tokio::time::timeout(self.timeout, self.store.set(key, raw, ttl)).await?
    }

    pub async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        tokio::time::timeout(
            self.timeout,
            self.store.set_if_absent(key, value.to_string(), ttl),
        )
        .await?
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        tokio::time::timeout(self.timeout, self.store.delete(key)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryKeyValueStore::new();
        store
            .set("k", "v".into(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_respects_live_entries() {
        let store = MemoryKeyValueStore::new();
        let ttl = Duration::from_secs(10);
        assert!(store.set_if_absent("k", "a".into(), ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "b".into(), ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.set_if_absent("k", "c".into(), ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_entries_nobody_reads_again() {
        let store = MemoryKeyValueStore::new();
        let ttl = Duration::from_secs(10);
        for offset in 0..1000 {
            let key = format!("delivery:quiz_export:{offset}");
            assert!(store.set_if_absent(&key, "1".into(), ttl).await.unwrap());
        }
        assert_eq!(store.lock().unwrap().map.len(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.set("k", "v".into(), ttl).await.unwrap();

        assert_eq!(store.lock().unwrap().map.len(), 1);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    struct StalledStore;

    #[async_trait]
    impl KeyValueStore for StalledStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> AppResult<()> {
            std::future::pending().await
        }
        async fn set_if_absent(&self, _: &str, _: String, _: Duration) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn delete(&self, _key: &str) -> AppResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let client = CacheClient::new(Arc::new(StalledStore), Duration::from_secs(5));
        let err = client.get_json::<String>("k").await.unwrap_err();
        assert!(matches!(err, AppError::TransientStore(_)));
    }
}
