use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::jwt;

/// The persisted credential pair for one CGM identity.
///
/// Records are only ever replaced wholesale; a refresh produces a new record.
///
/// # Example
/// ```
/// use cgm_link::auth::TokenRecord;
/// use chrono::Utc;
///
/// let record = TokenRecord {
///     access_token: "access".to_string(),
///     refresh_token: "refresh".to_string(),
///     token_type: "Bearer".to_string(),
///     scope: "offline_access".to_string(),
///     expires_in_seconds: 7200,
///     issued_at: Utc::now(),
/// };
/// assert!(record.expires_at() > Utc::now());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub scope: String,
    pub expires_in_seconds: i64,
    pub issued_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Absolute expiry derived from the locally recorded issuance time.
    ///
    /// Saturates instead of overflowing for out-of-range lifetimes.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Duration::try_seconds(self.expires_in_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(if self.expires_in_seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    /// Expiry used for validity decisions.
    ///
    /// The local `issued_at + expires_in` is authoritative; when the access
    /// token happens to be a JWT with an earlier `exp`, the earlier one wins.
    pub fn effective_expiry(&self) -> DateTime<Utc> {
        let local = self.expires_at();
        match jwt::expiry_claim(&self.access_token) {
            Some(claimed) if claimed < local => claimed,
            _ => local,
        }
    }

    /// True when the token stays valid for longer than `margin` after `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now.checked_add_signed(margin)
            .is_some_and(|deadline| self.effective_expiry() > deadline)
    }
}

/// Longest access token lifetime accepted from the provider.
pub(crate) const MAX_EXPIRES_IN_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Token endpoint payload.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
}

impl TokenResponse {
    /// Rejects lifetimes outside `0..=MAX_EXPIRES_IN_SECONDS`.
    pub(crate) fn into_record(self, issued_at: DateTime<Utc>) -> Result<TokenRecord, String> {
        if !(0..=MAX_EXPIRES_IN_SECONDS).contains(&self.expires_in) {
            return Err(format!("expires_in out of range: {}", self.expires_in));
        }
        Ok(TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            expires_in_seconds: self.expires_in,
            issued_at,
        })
    }
}
