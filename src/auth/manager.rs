use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use super::cache::TokenCache;
use super::endpoint::{Grant, GrantError, TokenEndpoint};
use super::error::AuthError;
use super::store::TokenStore;
use super::token::TokenRecord;
use crate::config::CgmConfig;

type RefreshResult = Result<TokenRecord, AuthError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Snapshot of the stored credentials, computed without network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    NotAuthenticated,
    Authenticated {
        expires_at: DateTime<Utc>,
        /// True when the next [`TokenManager::valid_access_token`] call will refresh.
        needs_refresh: bool,
        scope: String,
    },
}

/// Owns the credential lifecycle for one CGM identity.
///
/// Every token handed out by [`valid_access_token`](Self::valid_access_token)
/// stays valid for at least the configured safety margin. Concurrent callers
/// that find the token expiring share a single refresh request and all observe
/// its outcome.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use cgm_link::auth::{TokenManager, TokenStore};
/// use cgm_link::config::CgmConfig;
/// use cgm_link::storage::MemoryKeyValueStore;
///
/// # async fn example() -> Result<(), cgm_link::auth::AuthError> {
/// let config = CgmConfig::new("client-id", "client-secret", "mealtrack://auth/callback");
/// let store = TokenStore::new(Arc::new(MemoryKeyValueStore::new()));
/// let manager = TokenManager::new(&config, store)?;
///
/// println!("open {}", manager.authorization_url());
/// manager.exchange_authorization_code("code-from-redirect").await?;
/// let bearer = manager.valid_access_token().await?;
/// # let _ = bearer;
/// # Ok(())
/// # }
/// ```
pub struct TokenManager {
    endpoint: TokenEndpoint,
    login_url: Url,
    store: TokenStore,
    cache: Arc<TokenCache>,
    safety_margin: Duration,
    // Bumped whenever the current record is replaced or removed outside a refresh.
    generation: Arc<AtomicU64>,
    // Held across every store write and the generation check guarding it.
    writes: Arc<AsyncMutex<()>>,
    pending: Mutex<Option<PendingRefresh>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.endpoint.url)
            .field("store", &self.store)
            .field("safety_margin", &self.safety_margin)
            .finish()
    }
}

impl TokenManager {
    pub fn new(config: &CgmConfig, store: TokenStore) -> Result<Self, AuthError> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(AuthError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if config.timeout.is_zero() {
            return Err(AuthError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let base = config.base_url();
        let login_url = Url::parse(&format!("{base}/v2/oauth2/login"))
            .map_err(|e| AuthError::Configuration(format!("invalid base URL {base:?}: {e}")))?;
        let safety_margin = Duration::from_std(config.safety_margin)
            .map_err(|e| AuthError::Configuration(format!("invalid safety margin: {e}")))?;

        Ok(Self {
            endpoint: TokenEndpoint {
                client: reqwest::Client::new(),
                url: format!("{base}/v2/oauth2/token"),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri: config.redirect_uri.clone(),
                timeout: config.timeout,
            },
            login_url,
            store,
            cache: Arc::new(TokenCache::new()),
            safety_margin,
            generation: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(AsyncMutex::new(())),
            pending: Mutex::new(None),
        })
    }

    /// Use a preconfigured HTTP client (proxies, custom TLS roots).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.endpoint.client = client;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Provider login page requesting `offline_access`, so the grant includes a refresh token.
    pub fn authorization_url(&self) -> Url {
        self.build_authorization_url(None)
    }

    /// Same as [`authorization_url`](Self::authorization_url) with an opaque `state` echoed back on redirect.
    pub fn authorization_url_with_state(&self, state: &str) -> Url {
        self.build_authorization_url(Some(state))
    }

    fn build_authorization_url(&self, state: Option<&str>) -> Url {
        let mut url = self.login_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.endpoint.client_id)
                .append_pair("redirect_uri", &self.endpoint.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", "offline_access");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }

    /// Trade the code delivered to the redirect URI for a token pair.
    ///
    /// Store and cache are only touched on success.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenRecord, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::AuthExchangeFailed(
                "authorization code is empty".to_string(),
            ));
        }
        let record = self
            .endpoint
            .request(Grant::AuthorizationCode(code))
            .await
            .map_err(|err| {
                warn!(status = ?err.status(), "authorization code exchange failed");
                AuthError::AuthExchangeFailed(err.describe())
            })?;

        let _write = self.writes.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.save(&record).await?;
        self.cache.set(record.access_token.clone());
        info!(expires_at = %record.expires_at(), "authorization code exchanged");
        Ok(record)
    }

    /// Return an access token valid for at least the safety margin, refreshing if needed.
    pub async fn valid_access_token(&self) -> Result<String, AuthError> {
        let now = Utc::now();
        let record = self.store.load().await?;

        if let (Some(cached), Some(record)) = (self.cache.get(), record.as_ref()) {
            if cached == record.access_token && record.is_usable_at(now, self.safety_margin) {
                debug!("serving cached access token");
                return Ok(cached);
            }
        }

        let Some(record) = record else {
            self.cache.invalidate();
            return Err(AuthError::NotAuthenticated);
        };

        if record.is_usable_at(now, self.safety_margin) {
            debug!("priming cache from stored token record");
            self.cache.set(record.access_token.clone());
            return Ok(record.access_token);
        }

        info!(
            expires_at = %record.effective_expiry(),
            "access token inside safety margin, refreshing"
        );
        let refresh = self.refresh_context();
        let pending = self.join_or_start(move || refresh.refresh_if_stale().boxed());
        let refreshed = self.await_refresh(pending).await?;
        Ok(refreshed.access_token)
    }

    /// Mint a new token pair from `refresh_token`.
    ///
    /// Joins a refresh that is already in flight instead of sending a second
    /// request. A rejected refresh token clears store and cache and yields
    /// [`AuthError::ReauthorizationRequired`]; transient failures leave both untouched.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let refresh = self.refresh_context();
        let refresh_token = refresh_token.to_string();
        let pending = self.join_or_start(move || {
            async move { refresh.refresh_with(&refresh_token).await }.boxed()
        });
        self.await_refresh(pending).await
    }

    /// Forget the current identity. Safe to call repeatedly.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _write = self.writes.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate();
        self.store.clear().await?;
        info!("logged out of CGM provider");
        Ok(())
    }

    /// Inspect the stored record without touching the network.
    pub async fn status(&self) -> Result<TokenStatus, AuthError> {
        Ok(match self.store.load().await? {
            None => TokenStatus::NotAuthenticated,
            Some(record) => TokenStatus::Authenticated {
                expires_at: record.effective_expiry(),
                needs_refresh: !record.is_usable_at(Utc::now(), self.safety_margin),
                scope: record.scope,
            },
        })
    }

    fn refresh_context(&self) -> RefreshContext {
        RefreshContext {
            endpoint: self.endpoint.clone(),
            store: self.store.clone(),
            cache: self.cache.clone(),
            safety_margin: self.safety_margin,
            generation: self.generation.clone(),
            writes: self.writes.clone(),
            started_at: self.generation.load(Ordering::SeqCst),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingRefresh>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_or_start(
        &self,
        start: impl FnOnce() -> BoxFuture<'static, RefreshResult>,
    ) -> PendingRefresh {
        let mut slot = self.lock_pending();
        if let Some(existing) = slot.as_ref() {
            // A finished future left behind by a cancelled caller is stale.
            if existing.peek().is_none() {
                debug!("joining in-flight token refresh");
                return existing.clone();
            }
        }
        let pending = start().shared();
        *slot = Some(pending.clone());
        pending
    }

    async fn await_refresh(&self, pending: PendingRefresh) -> RefreshResult {
        let result = pending.clone().await;
        let mut slot = self.lock_pending();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
            *slot = None;
        }
        result
    }
}

/// Owned state a shared refresh future needs after the caller that started it is gone.
struct RefreshContext {
    endpoint: TokenEndpoint,
    store: TokenStore,
    cache: Arc<TokenCache>,
    safety_margin: Duration,
    generation: Arc<AtomicU64>,
    writes: Arc<AsyncMutex<()>>,
    started_at: u64,
}

impl RefreshContext {
    /// Refresh unless another writer already stored a usable record.
    async fn refresh_if_stale(self) -> RefreshResult {
        let current = self
            .store
            .load()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        if current.is_usable_at(Utc::now(), self.safety_margin) {
            debug!("stored token already refreshed by another writer");
            self.cache.set(current.access_token.clone());
            return Ok(current);
        }
        self.refresh_with(&current.refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> RefreshResult {
        match self.endpoint.request(Grant::RefreshToken(refresh_token)).await {
            Ok(record) => {
                let write = self.writes.lock().await;
                if self.superseded() {
                    drop(write);
                    debug!("refresh result discarded, record replaced while in flight");
                    return self
                        .store
                        .load()
                        .await?
                        .ok_or(AuthError::NotAuthenticated);
                }
                self.store.save(&record).await?;
                self.cache.set(record.access_token.clone());
                info!(expires_at = %record.expires_at(), "access token refreshed");
                Ok(record)
            }
            Err(err @ GrantError::Rejected { .. }) => {
                warn!(
                    reason = %err.describe(),
                    "refresh token rejected, clearing stored credentials"
                );
                let _write = self.writes.lock().await;
                if !self.superseded() {
                    self.cache.invalidate();
                    self.store.clear().await?;
                }
                Err(AuthError::ReauthorizationRequired)
            }
            Err(err) => {
                warn!(reason = %err.describe(), "token refresh failed");
                Err(AuthError::ProviderRequestFailed {
                    status: err.status(),
                    message: err.describe(),
                })
            }
        }
    }

    fn superseded(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    fn manager() -> TokenManager {
        let config = CgmConfig::new("client id", "secret", "mealtrack://auth/callback")
            .with_base_url("https://sandbox.example.test/");
        TokenManager::new(&config, TokenStore::new(Arc::new(MemoryKeyValueStore::new())))
            .unwrap()
    }

    #[test]
    fn new_rejects_incomplete_config() {
        let config = CgmConfig::new("", "secret", "app://cb");
        let err = TokenManager::new(&config, TokenStore::new(Arc::new(MemoryKeyValueStore::new())))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("client_id")));
    }

    #[test]
    fn new_rejects_zero_timeout() {
        let config = CgmConfig::new("id", "secret", "app://cb")
            .with_timeout(std::time::Duration::ZERO);
        let err = TokenManager::new(&config, TokenStore::new(Arc::new(MemoryKeyValueStore::new())))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("timeout")));
    }

    #[test]
    fn authorization_url_carries_oauth_parameters() {
        let url = manager().authorization_url();
        assert_eq!(url.path(), "/v2/oauth2/login");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "client id".to_string()),
                (
                    "redirect_uri".to_string(),
                    "mealtrack://auth/callback".to_string()
                ),
                ("response_type".to_string(), "code".to_string()),
                ("scope".to_string(), "offline_access".to_string()),
            ]
        );
        assert!(url.as_str().contains("client_id=client+id"));
    }

    #[test]
    fn authorization_url_with_state_appends_state() {
        let url = manager().authorization_url_with_state("xyz");
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "state" && v == "xyz"));
    }

    #[tokio::test]
    async fn empty_code_fails_without_network() {
        let err = manager().exchange_authorization_code("  ").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthExchangeFailed(_)));
    }

    #[tokio::test]
    async fn status_reports_refresh_need() {
        let manager = manager();
        assert_eq!(manager.status().await.unwrap(), TokenStatus::NotAuthenticated);

        let record = TokenRecord {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "Bearer".to_string(),
            scope: "offline_access".to_string(),
            expires_in_seconds: 120,
            issued_at: Utc::now(),
        };
        manager.store().save(&record).await.unwrap();
        match manager.status().await.unwrap() {
            TokenStatus::Authenticated { needs_refresh, .. } => assert!(needs_refresh),
            other => panic!("expected Authenticated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn logout_twice_is_fine() {
        let manager = manager();
        manager.cache().set("a");
        manager.logout().await.unwrap();
        manager.logout().await.unwrap();
        assert!(manager.cache().get().is_none());
    }
}
