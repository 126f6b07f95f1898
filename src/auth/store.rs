use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AuthError;
use super::token::TokenRecord;
use crate::storage::KeyValueStore;

/// Logical key the current record is stored under.
pub const DEFAULT_TOKEN_KEY: &str = "cgm_token";

const TOKEN_FILE_VERSION: u32 = 1;

/// Durable persistence for the current [`TokenRecord`].
///
/// One record per key; `save` supersedes whatever was there.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use cgm_link::auth::TokenStore;
/// use cgm_link::storage::MemoryKeyValueStore;
///
/// let store = TokenStore::new(Arc::new(MemoryKeyValueStore::new()));
/// assert_eq!(store.key(), "cgm_token");
/// ```
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("backend", &"..")
            .field("key", &self.key)
            .finish()
    }
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            token: record.clone(),
            saved_at: Utc::now(),
        };
        let serialized = serde_json::to_string(&file)?;
        self.backend.set(&self.key, &serialized).await?;
        debug!(key = %self.key, "token record saved");
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<TokenRecord>, AuthError> {
        let Some(raw) = self.backend.get(&self.key).await? else {
            return Ok(None);
        };
        let file: TokenFile = serde_json::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(AuthError::Serialization(format!(
                "unsupported token record version {}",
                file.version
            )));
        }
        Ok(Some(file.token))
    }

    pub async fn clear(&self) -> Result<(), AuthError> {
        self.backend.remove(&self.key).await?;
        debug!(key = %self.key, "token record cleared");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    token: TokenRecord,
    saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileKeyValueStore, MemoryKeyValueStore};
    use tempfile::TempDir;

    fn sample_record() -> TokenRecord {
        TokenRecord {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "Bearer".to_string(),
            scope: "offline_access".to_string(),
            expires_in_seconds: 7200,
            issued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn load_returns_none_when_absent() {
        let store = TokenStore::new(Arc::new(MemoryKeyValueStore::new()));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_through_files() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FileKeyValueStore::new(dir.path()));
        let store = TokenStore::new(backend.clone());
        let record = sample_record();
        store.save(&record).await.unwrap();

        let reopened = TokenStore::new(backend);
        assert_eq!(reopened.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = TokenStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.save(&sample_record()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let main = TokenStore::new(backend.clone());
        let other = TokenStore::new(backend).with_key("cgm_token_other");
        main.save(&sample_record()).await.unwrap();
        assert!(other.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let record = serde_json::to_value(sample_record()).unwrap();
        let raw = serde_json::json!({
            "version": 99,
            "token": record,
            "saved_at": Utc::now(),
        });
        backend
            .set(DEFAULT_TOKEN_KEY, &raw.to_string())
            .await
            .unwrap();
        let store = TokenStore::new(backend);
        assert!(matches!(
            store.load().await,
            Err(AuthError::Serialization(_))
        ));
    }
}
