//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    RateLimit,
    Network,
    Server,
    Api,
    Validation,
    Configuration,
    Storage,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Run the authorization-code flow (again).
    Reauthorize,
    RetryWithBackoff,
    FixRequest,
    CheckConfiguration,
    CheckStorage,
    ContactSupport,
}
