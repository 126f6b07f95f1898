use thiserror::Error;

use crate::error::status_suffix;

/// Errors raised by the credential lifecycle.
///
/// `Clone` so a single refresh outcome can be fanned out to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Authorization code exchange failed: {0}")]
    AuthExchangeFailed(String),
    #[error("Reauthorization required")]
    ReauthorizationRequired,
    #[error("Provider request failed{}: {message}", status_suffix(.status))]
    ProviderRequestFailed {
        status: Option<u16>,
        message: String,
    },
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
