//! Error types for cgm-link.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for all public cgm-link operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CgmError {
    #[error("Not authenticated: run the authorization flow first")]
    NotAuthenticated,

    #[error("Authorization code exchange failed: {0}")]
    AuthExchangeFailed(String),

    #[error("Refresh token rejected: reauthorization required")]
    ReauthorizationRequired,

    #[error("Provider request failed{}: {message}", status_suffix(.status))]
    ProviderRequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CgmError {
    /// Create a provider failure carrying an HTTP status.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::ProviderRequestFailed {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a provider failure that never produced a response (timeout or transport).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::ProviderRequestFailed {
            status: None,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAuthenticated => ErrorCategory::Authentication,
            Self::AuthExchangeFailed(_) => ErrorCategory::Authentication,
            Self::ReauthorizationRequired => ErrorCategory::Authorization,
            Self::ProviderRequestFailed { status, .. } => match status {
                Some(401 | 403) => ErrorCategory::Authorization,
                Some(429) => ErrorCategory::RateLimit,
                Some(500..=599) => ErrorCategory::Server,
                Some(_) => ErrorCategory::Api,
                None => ErrorCategory::Network,
            },
            Self::InvalidArgument(_) => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Whether the caller may reasonably retry the same operation later.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication | ErrorCategory::Authorization => {
                RecoverySuggestion::Reauthorize
            }
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Validation => RecoverySuggestion::FixRequest,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Storage => RecoverySuggestion::CheckStorage,
            ErrorCategory::Api => RecoverySuggestion::ContactSupport,
        }
    }
}

impl From<AuthError> for CgmError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotAuthenticated => Self::NotAuthenticated,
            AuthError::AuthExchangeFailed(message) => Self::AuthExchangeFailed(message),
            AuthError::ReauthorizationRequired => Self::ReauthorizationRequired,
            AuthError::ProviderRequestFailed { status, message } => {
                Self::ProviderRequestFailed { status, message }
            }
            AuthError::Io(message) | AuthError::Serialization(message) => Self::Storage(message),
            AuthError::Configuration(message) => Self::Configuration(message),
        }
    }
}

pub(crate) fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CgmError>;
