#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cgm_link::auth::{AuthError, TokenManager, TokenRecord, TokenStore};
use cgm_link::config::CgmConfig;
use cgm_link::storage::{KeyValueStore, MemoryKeyValueStore};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

pub const TOKEN_PATH: &str = "/v2/oauth2/token";
pub const READINGS_PATH: &str = "/v3/users/self/egvs";

pub fn config(base_url: &str) -> CgmConfig {
    CgmConfig::new("client-123", "secret-456", "mealtrack://auth/callback")
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
}

pub fn memory_store() -> TokenStore {
    TokenStore::new(Arc::new(MemoryKeyValueStore::new()))
}

/// Manager against `base_url` sharing `store` with the caller.
pub fn manager(base_url: &str, store: &TokenStore) -> Arc<TokenManager> {
    Arc::new(TokenManager::new(&config(base_url), store.clone()).expect("valid config"))
}

pub fn record(access: &str, refresh: &str, issued_at: DateTime<Utc>, expires_in: i64) -> TokenRecord {
    TokenRecord {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        scope: "offline_access".to_string(),
        expires_in_seconds: expires_in,
        issued_at,
    }
}

/// A record issued `age_secs` ago with a one hour lifetime.
pub fn record_aged(access: &str, refresh: &str, age_secs: i64) -> TokenRecord {
    record(access, refresh, Utc::now() - chrono::Duration::seconds(age_secs), 3600)
}

pub fn token_body(access: &str, refresh: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "offline_access"
    })
}

/// Memory store whose writes take `delay` to land.
pub struct SlowWriteStore {
    inner: MemoryKeyValueStore,
    delay: Duration,
}

impl SlowWriteStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryKeyValueStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl KeyValueStore for SlowWriteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.inner.remove(key).await
    }
}
