//! Idempotency key store: a key-value store with TTL. Entries are keyed
//! `idem:{node}:{idempotency_key}`; the value is immaterial.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// True if `key` is present (already processed).
    async fn exists(&self, key: &str) -> KeyStoreResult<bool>;

    /// Mark `key` processed with the given TTL in seconds.
    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> KeyStoreResult<()>;
}

/// Redis-backed key store, production implementation.
pub struct RedisKeyStore {
    client: redis::Client,
}

impl RedisKeyStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn exists(&self, key: &str) -> KeyStoreResult<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KeyStoreError::Unavailable(e.to_string()))?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| KeyStoreError::Unavailable(e.to_string()))?;
        Ok(value.is_some())
    }

    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> KeyStoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KeyStoreError::Unavailable(e.to_string()))?;
        let _: () = conn
            .set_ex(key, "1", ttl_seconds as u64)
            .await
            .map_err(|e| KeyStoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// In-memory key store for tests; ignores TTL expiry (tests run well under a
/// day) but tracks membership faithfully.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: Mutex<HashSet<String>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn exists(&self, key: &str) -> KeyStoreResult<bool> {
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn set_with_ttl(&self, key: &str, _ttl_seconds: i64) -> KeyStoreResult<()> {
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_reports_absence_then_presence() {
        let store = InMemoryKeyStore::new();
        assert!(!store.exists("idem:B:k1").await.unwrap());
        store.set_with_ttl("idem:B:k1", 86_400).await.unwrap();
        assert!(store.exists("idem:B:k1").await.unwrap());
    }
}
